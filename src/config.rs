// src/config.rs

//! Engine configuration.
//!
//! Settings are grouped into sections and deserialized from JSON. Every
//! section carries `#[serde(default)]`, so a config file only needs the keys
//! it wants to change; `{}` is a valid file.
//!
//! ```json
//! {
//!   "access": { "index_policy": "clamp" },
//!   "logging": { "trace_chunks": true }
//! }
//! ```

use crate::access::IndexPolicy;
use crate::error::{EngineError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable the demo binary reads a config path from.
pub const CONFIG_PATH_ENV: &str = "LANEWORK_CONFIG";

/// Defaults, shared by every engine built without an explicit config.
pub static DEFAULT_CONFIG: Lazy<EngineConfig> = Lazy::new(EngineConfig::default);

// --- Top-Level Configuration Structure ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Memory access rules.
    pub access: AccessConfig,
    /// Diagnostic output.
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Read and parse a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }
}

// --- Access Configuration ---

/// Aligned loads and stores have no setting here: a misaligned start is
/// always [`EngineError::Misaligned`]. Use the `_unaligned` engine methods
/// for arbitrary offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    /// Out-of-bounds gather/scatter offsets: reject or clamp.
    pub index_policy: IndexPolicy,
}

// --- Logging Configuration ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit a `trace!` line per chunk processed. Noisy.
    pub trace_chunks: bool,
}
