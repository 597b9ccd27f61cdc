// src/plan.rs

//! Chunk planning: splitting an element count into register-sized pieces.
//!
//! A [`ChunkPlan`] walks `[0, total)` in ascending order, yielding full
//! chunks of `lanes` elements followed by at most one shorter tail chunk.
//! The descriptors partition the range exactly, so the rest of the engine
//! never does pointer arithmetic on tails itself.

use crate::error::{EngineError, Result};
use crate::mask::LaneMask;
use core::iter::FusedIterator;
use core::num::NonZeroUsize;
use core::ops::Range;

/// One register's worth of work: `len` elements starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub start: usize,
    pub len: usize,
}

impl Chunk {
    #[inline(always)]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline(always)]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Whether this chunk fills a register of `lanes` lanes.
    #[inline(always)]
    pub fn is_full(&self, lanes: usize) -> bool {
        self.len == lanes
    }

    /// Mask for this chunk: `None` for a full chunk, the tail mask otherwise.
    #[inline]
    pub fn mask(&self, lanes: usize) -> Result<Option<LaneMask>> {
        if self.is_full(lanes) {
            Ok(None)
        } else {
            LaneMask::tail(self.len, lanes).map(Some)
        }
    }
}

/// Lazy sequence of [`Chunk`]s covering `[0, total)`.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    total: usize,
    lanes: usize,
    cursor: usize,
}

impl ChunkPlan {
    pub fn new(total: usize, lanes: NonZeroUsize) -> Self {
        Self {
            total,
            lanes: lanes.get(),
            cursor: 0,
        }
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Number of full-width chunks in the whole plan.
    #[inline]
    pub fn full_chunks(&self) -> usize {
        self.total / self.lanes
    }

    /// Length of the trailing partial chunk (zero when there is none).
    #[inline]
    pub fn tail_len(&self) -> usize {
        self.total % self.lanes
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    #[inline(always)]
    fn next(&mut self) -> Option<Chunk> {
        if self.cursor >= self.total {
            return None;
        }
        let len = self.lanes.min(self.total - self.cursor);
        let chunk = Chunk {
            start: self.cursor,
            len,
        };
        self.cursor += len;
        Some(chunk)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.cursor).div_ceil(self.lanes);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkPlan {}

impl FusedIterator for ChunkPlan {}

/// Plan the traversal of `total` elements with `lanes`-wide registers.
pub fn plan_chunks(total: usize, lanes: usize) -> Result<ChunkPlan> {
    NonZeroUsize::new(lanes)
        .map(|lanes| ChunkPlan::new(total, lanes))
        .ok_or(EngineError::ZeroLanes)
}
