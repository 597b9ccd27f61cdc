// src/features.rs

//! CPU feature reporting.
//!
//! The backend a build uses is fixed at compile time (`Native*` aliases);
//! these flags only report what the host could do, so callers can log why
//! they got the portable backend on a capable machine.

use bitflags::bitflags;
use log::info;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Vector instruction sets relevant to the backends.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CpuFeatures: u8 {
        const SSE2     = 1 << 0;
        const AVX2     = 1 << 1;
        const AVX512F  = 1 << 2;
        const AVX512DQ = 1 << 3; // 64-bit lane multiply without emulation.
        const NEON     = 1 << 4;
    }
}

/// Host features, probed once.
pub static DETECTED: Lazy<CpuFeatures> = Lazy::new(|| {
    let features = CpuFeatures::detect();
    info!("cpu features: detected {:?}, compiled {:?}", features, CpuFeatures::compiled());
    features
});

impl CpuFeatures {
    /// Probe the running CPU.
    #[cfg(target_arch = "x86_64")]
    pub fn detect() -> Self {
        let mut features = CpuFeatures::empty();
        if is_x86_feature_detected!("sse2") {
            features |= CpuFeatures::SSE2;
        }
        if is_x86_feature_detected!("avx2") {
            features |= CpuFeatures::AVX2;
        }
        if is_x86_feature_detected!("avx512f") {
            features |= CpuFeatures::AVX512F;
        }
        if is_x86_feature_detected!("avx512dq") {
            features |= CpuFeatures::AVX512DQ;
        }
        features
    }

    #[cfg(target_arch = "aarch64")]
    pub fn detect() -> Self {
        if std::arch::is_aarch64_feature_detected!("neon") {
            CpuFeatures::NEON
        } else {
            CpuFeatures::empty()
        }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    pub fn detect() -> Self {
        CpuFeatures::empty()
    }

    /// Features the build enabled via `target_feature`.
    pub fn compiled() -> Self {
        let mut features = CpuFeatures::empty();
        if cfg!(target_feature = "sse2") {
            features |= CpuFeatures::SSE2;
        }
        if cfg!(target_feature = "avx2") {
            features |= CpuFeatures::AVX2;
        }
        if cfg!(target_feature = "avx512f") {
            features |= CpuFeatures::AVX512F;
        }
        if cfg!(target_feature = "avx512dq") {
            features |= CpuFeatures::AVX512DQ;
        }
        if cfg!(target_feature = "neon") {
            features |= CpuFeatures::NEON;
        }
        features
    }

    /// Whether the AVX-512 backends were compiled in.
    #[inline]
    pub fn native_avx512() -> bool {
        Self::compiled().contains(CpuFeatures::AVX512F)
    }
}
