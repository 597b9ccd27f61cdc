// src/error.rs

//! Error type shared by every engine operation.
//!
//! All failures are precondition violations detected before any memory is
//! touched, so a returned error always means "nothing happened".

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("address {address:#x} is not aligned to {required} bytes")]
    Misaligned { address: usize, required: usize },

    #[error("lane {lane} offset {index} is out of bounds for capacity {capacity}")]
    IndexOutOfBounds {
        lane: usize,
        index: usize,
        capacity: usize,
    },

    #[error("tail mask needs 0 < remainder < {lanes}, got {remainder}")]
    InvalidTailMask { remainder: usize, lanes: usize },

    #[error("span {offset}..{offset}+{len} exceeds capacity {capacity}")]
    RangeOutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("length {len} exceeds register width of {lanes} lanes")]
    LengthExceedsLanes { len: usize, lanes: usize },

    #[error("mask activates lanes at or past length {len}")]
    MaskExceedsLength { len: usize },

    #[error("expected {expected} lanes, got {actual}")]
    LaneCountMismatch { expected: usize, actual: usize },

    #[error("lane {lane} selects source lane {selected}, limit is {limit}")]
    InvalidPermutationSource {
        lane: usize,
        selected: usize,
        limit: usize,
    },

    #[error("permutation is not a bijection and has no inverse")]
    NotInvertible,

    #[error("expected {expected} source registers, got {actual}")]
    SourceCountMismatch { expected: usize, actual: usize },

    #[error("record of {fields} fields does not fit a {lanes}-lane register")]
    InvalidRecordShape { fields: usize, lanes: usize },

    #[error("length {len} is not a whole number of {fields}-field records")]
    PartialRecord { len: usize, fields: usize },

    #[error("expected {expected} elements, got {actual}")]
    BufferLengthMismatch { expected: usize, actual: usize },

    #[error("lane width must be non-zero")]
    ZeroLanes,

    #[error("invalid configuration: {0}")]
    Config(String),
}
