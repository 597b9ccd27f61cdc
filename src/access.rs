// src/access.rs

//! Gather/scatter: register access at arbitrary element offsets.
//!
//! Real data is often not laid out sequentially (picking a field out of
//! packed records, walking an index list). Gathering costs roughly as many
//! cache-line touches as scalar addressing, but the arithmetic that follows
//! still runs as one data-parallel operation, so it pays off when the
//! per-register compute dominates.
//!
//! Every offset is validated before memory is touched: an out-of-bounds
//! active lane rejects the whole operation (or is clamped, under
//! [`IndexPolicy::Clamp`]), so a partial gather or scatter is never
//! observable.
//!
//! ## Duplicate destinations
//!
//! When two active lanes of a scatter target the same offset, the **highest
//! lane wins**. AVX-512 scatters are ordered from the lowest to the highest
//! mask bit, and the portable and scalar backends write lanes in ascending
//! order to match.

use crate::backend::Backend;
use crate::error::{EngineError, Result};
use crate::mask::LaneMask;
use log::debug;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// What to do with an active gather/scatter offset past the buffer end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Fail the whole operation with [`EngineError::IndexOutOfBounds`].
    #[default]
    Reject,
    /// Clamp the offset to the last element of the buffer.
    Clamp,
}

/// Exactly one element offset (not byte offset) per register lane.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IndexSet {
    offsets: Vec<usize>,
}

impl IndexSet {
    /// Build an index set for a `lanes`-wide register.
    pub fn new(offsets: Vec<usize>, lanes: usize) -> Result<Self> {
        if offsets.len() != lanes {
            return Err(EngineError::LaneCountMismatch {
                expected: lanes,
                actual: offsets.len(),
            });
        }
        Ok(Self { offsets })
    }

    pub fn from_slice(offsets: &[usize], lanes: usize) -> Result<Self> {
        Self::new(offsets.to_vec(), lanes)
    }

    /// Offsets `start, start + stride, ...` for every lane.
    ///
    /// Offsets that overflow saturate at `usize::MAX`, which no buffer can
    /// hold, so [`IndexPolicy`] decides their fate at access time.
    pub fn strided(start: usize, stride: usize, lanes: usize) -> Self {
        Self {
            offsets: (0..lanes)
                .map(|lane| lane.saturating_mul(stride).saturating_add(start))
                .collect(),
        }
    }

    #[inline(always)]
    pub fn lanes(&self) -> usize {
        self.offsets.len()
    }

    #[inline(always)]
    pub fn get(&self, lane: usize) -> usize {
        self.offsets[lane]
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[usize] {
        &self.offsets
    }

    /// Largest offset among the active lanes.
    pub fn max_active(&self, mask: LaneMask) -> Option<usize> {
        mask.active_lanes().map(|lane| self.offsets[lane]).max()
    }

    /// Check every active offset against `capacity`.
    pub fn validate(&self, capacity: usize, mask: LaneMask) -> Result<()> {
        self.check_width(mask)?;
        match mask
            .active_lanes()
            .find(|&lane| self.offsets[lane] >= capacity)
        {
            Some(lane) => Err(EngineError::IndexOutOfBounds {
                lane,
                index: self.offsets[lane],
                capacity,
            }),
            None => Ok(()),
        }
    }

    /// Apply `policy` so that every active offset is below `capacity`.
    ///
    /// Borrows `self` when no offset needed to change.
    pub fn resolve(
        &self,
        capacity: usize,
        mask: LaneMask,
        policy: IndexPolicy,
    ) -> Result<Cow<'_, IndexSet>> {
        match policy {
            IndexPolicy::Reject => self.validate(capacity, mask).map(|()| Cow::Borrowed(self)),
            IndexPolicy::Clamp => {
                self.check_width(mask)?;
                if self.validate(capacity, mask).is_ok() {
                    return Ok(Cow::Borrowed(self));
                }
                // With nothing to clamp to, any active lane is out of bounds.
                if capacity == 0 {
                    return self.validate(capacity, mask).map(|()| Cow::Borrowed(self));
                }
                let offsets = self
                    .offsets
                    .iter()
                    .enumerate()
                    .map(|(lane, &offset)| {
                        if mask.is_active(lane) {
                            offset.min(capacity - 1)
                        } else {
                            offset
                        }
                    })
                    .collect();
                Ok(Cow::Owned(IndexSet { offsets }))
            }
        }
    }

    /// Offsets written by more than one active lane, ascending.
    pub fn duplicates(&self, mask: LaneMask) -> Vec<usize> {
        let mut active: Vec<usize> = mask.active_lanes().map(|lane| self.offsets[lane]).collect();
        active.sort_unstable();
        let mut dups: Vec<usize> = active
            .windows(2)
            .filter(|pair| pair[0] == pair[1])
            .map(|pair| pair[0])
            .collect();
        dups.dedup();
        dups
    }

    fn check_width(&self, mask: LaneMask) -> Result<()> {
        if mask.lanes() != self.lanes() {
            return Err(EngineError::LaneCountMismatch {
                expected: self.lanes(),
                actual: mask.lanes(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexSet({:?})", self.offsets)
    }
}

fn check_lanes<B: Backend>(indices: &IndexSet) -> Result<()> {
    if indices.lanes() != B::LANES {
        return Err(EngineError::LaneCountMismatch {
            expected: B::LANES,
            actual: indices.lanes(),
        });
    }
    Ok(())
}

/// Gather `src[indices[i]]` into lane `i` for every active lane.
///
/// Inactive lanes are zero. With no mask, every lane is active.
pub fn gather<B: Backend>(
    src: &[B::Elem],
    indices: &IndexSet,
    mask: Option<LaneMask>,
    policy: IndexPolicy,
) -> Result<B::Register> {
    check_lanes::<B>(indices)?;
    let mask = mask.unwrap_or_else(|| LaneMask::full(B::LANES));
    let resolved = indices.resolve(src.len(), mask, policy)?;
    Ok(B::gather(src, &resolved, mask))
}

/// Write lane `i` of `register` to `dst[indices[i]]` for every active lane.
///
/// Duplicate active offsets resolve to the highest lane's value.
pub fn scatter<B: Backend>(
    dst: &mut [B::Elem],
    indices: &IndexSet,
    register: B::Register,
    mask: Option<LaneMask>,
    policy: IndexPolicy,
) -> Result<()> {
    check_lanes::<B>(indices)?;
    let mask = mask.unwrap_or_else(|| LaneMask::full(B::LANES));
    let resolved = indices.resolve(dst.len(), mask, policy)?;
    if log::log_enabled!(log::Level::Debug) {
        let dups = resolved.duplicates(mask);
        if !dups.is_empty() {
            debug!(
                "scatter has colliding offsets {:?}; highest lane wins",
                dups
            );
        }
    }
    B::scatter(dst, &resolved, register, mask);
    Ok(())
}

#[cfg(test)]
mod tests;
