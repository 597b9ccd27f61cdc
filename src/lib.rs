// src/lib.rs

//! # lanework
//!
//! A lane-parallel processing engine: buffers are walked one 512-bit
//! register at a time, the final partial register is handled with a lane
//! mask instead of a scalar epilogue, and non-contiguous or record-shaped
//! data is brought into lane order with gather/scatter and lane
//! permutations.
//!
//! ## Pieces
//!
//! - [`buffer`]: 64-byte aligned, zero-initialised element storage.
//! - [`plan`]: splits an element count into full chunks and a tail.
//! - [`mask`]: per-lane active/inactive selectors.
//! - [`kernel`]: lane-wise add, multiply and permute-fused operations.
//! - [`access`]: gather/scatter at arbitrary element offsets.
//! - [`layout`]: AoS ↔ SoA lane permutations.
//! - [`backend`]: the register implementations (scalar, portable, AVX-512).
//! - [`engine`]: whole-buffer traversals built from the above.
//!
//! ```
//! use lanework::backend::NativeI64;
//! use lanework::{Engine, Op};
//!
//! let engine = Engine::<NativeI64>::with_defaults();
//! let a: Vec<i64> = (1..=18).collect();
//! let b: Vec<i64> = (1..=18).map(|x| x * 10).collect();
//! let mut c = vec![0; 18];
//! engine.zip_with(&Op::Add, &a, &b, &mut c).unwrap();
//! assert_eq!(c[17], 198);
//! ```

pub mod access;
pub mod backend;
pub mod buffer;
pub mod config;
pub mod element;
pub mod engine;
pub mod error;
pub mod features;
pub mod kernel;
pub mod layout;
pub mod mask;
pub mod plan;

pub use access::{IndexPolicy, IndexSet};
pub use backend::Backend;
pub use buffer::{AlignedBuffer, REGISTER_BYTES};
pub use config::EngineConfig;
pub use element::Element;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use features::CpuFeatures;
pub use kernel::{BinaryOp, FusedOp, Op};
pub use layout::{Permutation, RecordShape, RecordTransposer};
pub use mask::LaneMask;
pub use plan::{plan_chunks, Chunk, ChunkPlan};
