// src/mask.rs

//! # Lane Masks
//!
//! `LaneMask` is a bit-per-lane selector: bit `i` set means lane `i` is
//! active. It mirrors an AVX-512 k-register (`__mmask8` / `__mmask16`) but
//! carries its own width so that the complement never activates lanes the
//! register does not have.
//!
//! The same mask serves two different memory semantics:
//!
//! - **masked load**: inactive lanes are filled with zero, never read;
//! - **masked store**: memory behind inactive lanes is left untouched.

use crate::error::{EngineError, Result};
use core::fmt;
use core::ops::{BitAnd, BitOr, Not};

/// Widest register a mask can describe.
pub const MAX_LANES: usize = 64;

#[inline(always)]
fn width_bits(lanes: usize) -> u64 {
    if lanes >= MAX_LANES {
        u64::MAX
    } else {
        (1u64 << lanes) - 1
    }
}

/// A per-lane active/inactive selector for a register of `lanes` lanes.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct LaneMask {
    bits: u64,
    lanes: u8,
}

impl LaneMask {
    /// Mask with every lane active.
    #[inline(always)]
    pub fn full(lanes: usize) -> Self {
        assert!(lanes <= MAX_LANES, "mask width {} exceeds {}", lanes, MAX_LANES);
        Self {
            bits: width_bits(lanes),
            lanes: lanes as u8,
        }
    }

    /// Mask with no lane active.
    #[inline(always)]
    pub fn empty(lanes: usize) -> Self {
        assert!(lanes <= MAX_LANES, "mask width {} exceeds {}", lanes, MAX_LANES);
        Self {
            bits: 0,
            lanes: lanes as u8,
        }
    }

    /// Tail mask with the low `remainder` lanes active.
    ///
    /// Only defined for `0 < remainder < lanes`; a remainder of zero or a
    /// full register must take the unmasked path instead.
    pub fn tail(remainder: usize, lanes: usize) -> Result<Self> {
        if remainder == 0 || remainder >= lanes || lanes > MAX_LANES {
            return Err(EngineError::InvalidTailMask { remainder, lanes });
        }
        Ok(Self {
            bits: (1u64 << remainder) - 1,
            lanes: lanes as u8,
        })
    }

    /// The low `min(len, lanes)` lanes active; total for any `len`.
    #[inline(always)]
    pub fn prefix(len: usize, lanes: usize) -> Self {
        Self::from_bits(width_bits(len), lanes)
    }

    /// Build from raw bits; bits at or above `lanes` are dropped.
    #[inline(always)]
    pub fn from_bits(bits: u64, lanes: usize) -> Self {
        let full = Self::full(lanes);
        Self {
            bits: bits & full.bits,
            lanes: full.lanes,
        }
    }

    /// Build from one boolean per lane.
    pub fn from_lanes<I: IntoIterator<Item = bool>>(lanes: I) -> Self {
        let mut bits = 0u64;
        let mut count = 0usize;
        for active in lanes {
            assert!(count < MAX_LANES, "mask width exceeds {}", MAX_LANES);
            if active {
                bits |= 1 << count;
            }
            count += 1;
        }
        Self {
            bits,
            lanes: count as u8,
        }
    }

    #[inline(always)]
    pub fn lanes(&self) -> usize {
        self.lanes as usize
    }

    #[inline(always)]
    pub fn bits(&self) -> u64 {
        self.bits
    }

    #[inline(always)]
    pub fn is_active(&self, lane: usize) -> bool {
        lane < self.lanes() && self.bits & (1 << lane) != 0
    }

    /// Number of active lanes.
    #[inline(always)]
    pub fn count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    #[inline(always)]
    pub fn any(&self) -> bool {
        self.bits != 0
    }

    #[inline(always)]
    pub fn all(&self) -> bool {
        self.bits == width_bits(self.lanes())
    }

    #[inline(always)]
    pub fn none(&self) -> bool {
        self.bits == 0
    }

    /// Highest active lane, if any.
    #[inline(always)]
    pub fn highest_active(&self) -> Option<usize> {
        if self.bits == 0 {
            None
        } else {
            Some(63 - self.bits.leading_zeros() as usize)
        }
    }

    /// Whether every active lane lies below `len`.
    #[inline(always)]
    pub fn fits_within(&self, len: usize) -> bool {
        self.highest_active().map_or(true, |lane| lane < len)
    }

    /// Active lane indices in ascending order.
    #[inline(always)]
    pub fn active_lanes(&self) -> ActiveLanes {
        ActiveLanes { bits: self.bits }
    }
}

/// Iterator over the active lanes of a [`LaneMask`], lowest first.
#[derive(Clone, Debug)]
pub struct ActiveLanes {
    bits: u64,
}

impl Iterator for ActiveLanes {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        if self.bits == 0 {
            return None;
        }
        let lane = self.bits.trailing_zeros() as usize;
        self.bits &= self.bits - 1;
        Some(lane)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.bits.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for ActiveLanes {}

impl fmt::Debug for LaneMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LaneMask{}({:0width$b})",
            self.lanes,
            self.bits,
            width = self.lanes()
        )
    }
}

// ============================================================================
// Boolean Operations
// ============================================================================

impl BitAnd for LaneMask {
    type Output = Self;
    #[inline(always)]
    fn bitand(self, rhs: Self) -> Self {
        debug_assert_eq!(self.lanes, rhs.lanes);
        Self {
            bits: self.bits & rhs.bits,
            lanes: self.lanes,
        }
    }
}

impl BitOr for LaneMask {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        debug_assert_eq!(self.lanes, rhs.lanes);
        Self {
            bits: (self.bits | rhs.bits) & width_bits(self.lanes()),
            lanes: self.lanes,
        }
    }
}

impl Not for LaneMask {
    type Output = Self;
    #[inline(always)]
    fn not(self) -> Self {
        Self {
            bits: !self.bits & width_bits(self.lanes()),
            lanes: self.lanes,
        }
    }
}
