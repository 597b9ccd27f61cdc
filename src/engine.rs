// src/engine.rs

//! The driver: whole-buffer traversals built from the lane primitives.
//!
//! An [`Engine`] is a backend plus a configuration. Each traversal plans
//! its chunks, runs full chunks unmasked and the tail under a tail mask,
//! and walks chunks in ascending offset order.
//!
//! Every precondition (lengths, ranges, alignment, index bounds, operation
//! width) is checked before the first element is written, so an `Err`
//! return leaves every buffer exactly as it was.

use crate::access::{self, IndexSet};
use crate::backend::Backend;
use crate::buffer::AlignedBuffer;
use crate::config::{EngineConfig, DEFAULT_CONFIG};
use crate::element::Element;
use crate::error::{EngineError, Result};
use crate::kernel::{self, BinaryOp, Op};
use crate::layout::{self, Permutation, RecordTransposer};
use crate::mask::LaneMask;
use crate::plan::{plan_chunks, Chunk, ChunkPlan};
use core::marker::PhantomData;
use log::{debug, trace};

/// Load a chunk: unmasked when `mask` is `None`, zero-filled otherwise.
#[inline(always)]
fn load_chunk<B: Backend>(src: &[B::Elem], mask: Option<LaneMask>) -> B::Register {
    match mask {
        None => B::load(src),
        Some(mask) => B::load_masked(src, mask),
    }
}

#[inline(always)]
fn store_chunk<B: Backend>(register: B::Register, dst: &mut [B::Elem], mask: Option<LaneMask>) {
    match mask {
        None => B::store(register, dst),
        Some(mask) => B::store_masked(register, dst, mask),
    }
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(EngineError::BufferLengthMismatch { expected, actual });
    }
    Ok(())
}

/// Runs lane-parallel traversals on backend `B`.
#[derive(Debug, Clone)]
pub struct Engine<B: Backend> {
    config: EngineConfig,
    _backend: PhantomData<B>,
}

impl<B: Backend> Default for Engine<B> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<B: Backend> Engine<B> {
    pub fn new(config: EngineConfig) -> Self {
        debug!(
            "engine on {} ({} x {}, {}-byte registers): {:?}",
            B::NAME,
            B::LANES,
            <B::Elem as Element>::NAME,
            B::register_bytes(),
            config
        );
        Self {
            config,
            _backend: PhantomData,
        }
    }

    /// An engine with [`DEFAULT_CONFIG`].
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CONFIG.clone())
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn lanes(&self) -> usize {
        B::LANES
    }

    /// Chunks covering `[0, total)` for this backend's width.
    pub fn plan(&self, total: usize) -> Result<ChunkPlan> {
        plan_chunks(total, B::LANES)
    }

    /// Tail mask for a remainder of `remainder` elements.
    pub fn tail_mask(&self, remainder: usize) -> Result<LaneMask> {
        LaneMask::tail(remainder, B::LANES)
    }

    /// Fails when `offset` does not start a register boundary.
    pub fn check_alignment(&self, buffer: &AlignedBuffer<B::Elem>, offset: usize) -> Result<()> {
        let required = B::register_bytes();
        if buffer.is_aligned_at(offset, required) {
            return Ok(());
        }
        Err(EngineError::Misaligned {
            address: buffer.address_of(offset),
            required,
        })
    }

    fn check_range(offset: usize, len: usize, capacity: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(()),
            _ => Err(EngineError::RangeOutOfBounds {
                offset,
                len,
                capacity,
            }),
        }
    }

    /// What a zero-length load returns; no memory is read.
    #[inline]
    fn empty_register() -> B::Register {
        B::splat(<B::Elem as Element>::ZERO)
    }

    /// Mask for touching `len` elements; `None` means the whole register.
    fn access_mask(len: usize, mask: Option<LaneMask>) -> Result<Option<LaneMask>> {
        if len > B::LANES {
            return Err(EngineError::LengthExceedsLanes {
                len,
                lanes: B::LANES,
            });
        }
        match mask {
            Some(mask) => {
                if mask.lanes() != B::LANES {
                    return Err(EngineError::LaneCountMismatch {
                        expected: B::LANES,
                        actual: mask.lanes(),
                    });
                }
                if !mask.fits_within(len) {
                    return Err(EngineError::MaskExceedsLength { len });
                }
                Ok(Some(mask))
            }
            None if len == B::LANES => Ok(None),
            None => Ok(Some(LaneMask::prefix(len, B::LANES))),
        }
    }

    // ------------------------------------------------------------------------
    // Single-register memory access
    // ------------------------------------------------------------------------

    /// Load `len` elements at `offset`; lanes at or past `len` are zero.
    ///
    /// `offset` must sit on a register boundary (see [`Self::check_alignment`]).
    pub fn load(
        &self,
        buffer: &AlignedBuffer<B::Elem>,
        offset: usize,
        len: usize,
        mask: Option<LaneMask>,
    ) -> Result<B::Register> {
        let mask = Self::access_mask(len, mask)?;
        Self::check_range(offset, len, buffer.capacity())?;
        self.check_alignment(buffer, offset)?;
        if len == 0 {
            return Ok(Self::empty_register());
        }
        Ok(load_chunk::<B>(&buffer[offset..offset + len], mask))
    }

    /// Store the low `len` lanes of `register` at `offset`; nothing past `len` is written.
    pub fn store(
        &self,
        buffer: &mut AlignedBuffer<B::Elem>,
        offset: usize,
        register: B::Register,
        len: usize,
        mask: Option<LaneMask>,
    ) -> Result<()> {
        let mask = Self::access_mask(len, mask)?;
        Self::check_range(offset, len, buffer.capacity())?;
        self.check_alignment(buffer, offset)?;
        if len == 0 {
            return Ok(());
        }
        store_chunk::<B>(register, &mut buffer[offset..offset + len], mask);
        Ok(())
    }

    /// [`Self::load`] without the alignment requirement.
    pub fn load_unaligned(
        &self,
        src: &[B::Elem],
        offset: usize,
        len: usize,
        mask: Option<LaneMask>,
    ) -> Result<B::Register> {
        let mask = Self::access_mask(len, mask)?;
        Self::check_range(offset, len, src.len())?;
        if len == 0 {
            return Ok(Self::empty_register());
        }
        Ok(load_chunk::<B>(&src[offset..offset + len], mask))
    }

    /// [`Self::store`] without the alignment requirement.
    pub fn store_unaligned(
        &self,
        dst: &mut [B::Elem],
        offset: usize,
        register: B::Register,
        len: usize,
        mask: Option<LaneMask>,
    ) -> Result<()> {
        let mask = Self::access_mask(len, mask)?;
        Self::check_range(offset, len, dst.len())?;
        if len == 0 {
            return Ok(());
        }
        store_chunk::<B>(register, &mut dst[offset..offset + len], mask);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Register-level operations
    // ------------------------------------------------------------------------

    /// Gather under the configured [`IndexPolicy`](crate::access::IndexPolicy).
    pub fn gather(
        &self,
        src: &[B::Elem],
        indices: &IndexSet,
        mask: Option<LaneMask>,
    ) -> Result<B::Register> {
        access::gather::<B>(src, indices, mask, self.config.access.index_policy)
    }

    /// Scatter under the configured policy; colliding offsets keep the highest lane.
    pub fn scatter(
        &self,
        dst: &mut [B::Elem],
        indices: &IndexSet,
        register: B::Register,
        mask: Option<LaneMask>,
    ) -> Result<()> {
        access::scatter::<B>(dst, indices, register, mask, self.config.access.index_policy)
    }

    pub fn apply(
        &self,
        op: &Op,
        a: B::Register,
        b: B::Register,
        mask: Option<LaneMask>,
    ) -> Result<B::Register> {
        kernel::apply::<B>(op, a, b, mask)
    }

    pub fn apply_scalar(
        &self,
        op: &Op,
        a: B::Register,
        scalar: B::Elem,
        mask: Option<LaneMask>,
    ) -> Result<B::Register> {
        kernel::apply_scalar::<B>(op, a, scalar, mask)
    }

    pub fn permute(&self, registers: &[B::Register], perm: &Permutation) -> Result<B::Register> {
        layout::permute::<B>(registers, perm)
    }

    // ------------------------------------------------------------------------
    // Whole-buffer traversals
    // ------------------------------------------------------------------------

    fn traverse<F>(&self, name: &str, plan: ChunkPlan, mut step: F) -> Result<()>
    where
        F: FnMut(Chunk) -> Result<()>,
    {
        debug!(
            "{}: {} elements in {} chunks ({} full) on {}",
            name,
            plan.total(),
            plan.len(),
            plan.full_chunks(),
            B::NAME
        );
        for chunk in plan {
            if self.config.logging.trace_chunks {
                trace!("{}: chunk {}..{}", name, chunk.start, chunk.end());
            }
            step(chunk)?;
        }
        Ok(())
    }

    /// `out[i] = a[i] op b[i]` for every element.
    pub fn zip_with(&self, op: &Op, a: &[B::Elem], b: &[B::Elem], out: &mut [B::Elem]) -> Result<()> {
        check_len(a.len(), b.len())?;
        check_len(a.len(), out.len())?;
        kernel::validate::<B>(op)?;
        self.traverse("zip_with", self.plan(a.len())?, |chunk| {
            let mask = chunk.mask(B::LANES)?;
            let range = chunk.range();
            let x = load_chunk::<B>(&a[range.clone()], mask);
            let y = load_chunk::<B>(&b[range.clone()], mask);
            let z = kernel::apply::<B>(op, x, y, mask)?;
            store_chunk::<B>(z, &mut out[range], mask);
            Ok(())
        })
    }

    /// `out[i] = a[i] op scalar` for every element.
    pub fn map_scalar(&self, op: &Op, a: &[B::Elem], scalar: B::Elem, out: &mut [B::Elem]) -> Result<()> {
        check_len(a.len(), out.len())?;
        kernel::validate::<B>(op)?;
        let s = B::splat(scalar);
        self.traverse("map_scalar", self.plan(a.len())?, |chunk| {
            let mask = chunk.mask(B::LANES)?;
            let range = chunk.range();
            let x = load_chunk::<B>(&a[range.clone()], mask);
            let z = kernel::apply::<B>(op, x, s, mask)?;
            store_chunk::<B>(z, &mut out[range], mask);
            Ok(())
        })
    }

    /// `acc[i] = acc[i] op other[i]` in place.
    pub fn update(&self, op: &Op, acc: &mut [B::Elem], other: &[B::Elem]) -> Result<()> {
        check_len(acc.len(), other.len())?;
        kernel::validate::<B>(op)?;
        self.traverse("update", self.plan(acc.len())?, |chunk| {
            let mask = chunk.mask(B::LANES)?;
            let range = chunk.range();
            let x = load_chunk::<B>(&acc[range.clone()], mask);
            let y = load_chunk::<B>(&other[range.clone()], mask);
            let z = kernel::apply::<B>(op, x, y, mask)?;
            store_chunk::<B>(z, &mut acc[range], mask);
            Ok(())
        })
    }

    /// Gather at `indices`, combine with `scalar`, scatter back to the same offsets.
    pub fn gather_apply_scatter(
        &self,
        buffer: &mut [B::Elem],
        indices: &IndexSet,
        op: &Op,
        scalar: B::Elem,
        mask: Option<LaneMask>,
    ) -> Result<()> {
        kernel::validate::<B>(op)?;
        let gathered = self.gather(buffer, indices, mask)?;
        let updated = self.apply_scalar(op, gathered, scalar, mask)?;
        self.scatter(buffer, indices, updated, mask)
    }

    /// Combine every record of an AoS buffer field-wise with `field_values`.
    ///
    /// The buffer is walked `used_lanes` elements at a time; each chunk is
    /// regrouped to SoA, combined, restored and stored under the record mask,
    /// so dead lanes are never written.
    pub fn transform_records(
        &self,
        buffer: &mut [B::Elem],
        transposer: &RecordTransposer,
        field_values: &[B::Elem],
        op: BinaryOp,
    ) -> Result<()> {
        let shape = transposer.shape();
        let operand = transposer.field_operand::<B>(field_values)?;
        if buffer.len() % shape.fields() != 0 {
            return Err(EngineError::PartialRecord {
                len: buffer.len(),
                fields: shape.fields(),
            });
        }
        let used = shape.used_lanes();
        self.traverse("transform_records", plan_chunks(buffer.len(), used)?, |chunk| {
            let mask = if chunk.len == used {
                transposer.lane_mask()
            } else {
                LaneMask::prefix(chunk.len, B::LANES)
            };
            let range = chunk.range();
            let aos = B::load_masked(&buffer[range.clone()], mask);
            let out = transposer.apply_fieldwise::<B>(op, aos, operand)?;
            B::store_masked(out, &mut buffer[range], mask);
            Ok(())
        })
    }

    /// Split an AoS buffer into one buffer per field.
    ///
    /// `outputs[f][r]` receives field `f` of record `r`.
    pub fn deinterleave(
        &self,
        transposer: &RecordTransposer,
        aos: &[B::Elem],
        outputs: &mut [&mut [B::Elem]],
    ) -> Result<()> {
        let records = self.check_records(transposer, aos.len(), outputs.len())?;
        for out in outputs.iter() {
            check_len(records, out.len())?;
        }
        let fields = transposer.shape().fields();
        self.traverse("deinterleave", self.plan(records)?, |chunk| {
            let mask = chunk.mask(B::LANES)?;
            let base = chunk.start * fields;
            let span = chunk.len * fields;
            let regs: Vec<B::Register> = (0..fields)
                .map(|k| {
                    let (lo, hi) = Self::register_span(k, span);
                    let part = Self::span_mask(hi - lo);
                    load_chunk::<B>(&aos[base + lo..base + hi], part)
                })
                .collect();
            let split = transposer.deinterleave::<B>(&regs)?;
            for (reg, out) in split.into_iter().zip(outputs.iter_mut()) {
                store_chunk::<B>(reg, &mut out[chunk.range()], mask);
            }
            Ok(())
        })
    }

    /// Merge one buffer per field back into an AoS buffer.
    pub fn interleave(
        &self,
        transposer: &RecordTransposer,
        fields_in: &[&[B::Elem]],
        aos: &mut [B::Elem],
    ) -> Result<()> {
        let records = self.check_records(transposer, aos.len(), fields_in.len())?;
        for field in fields_in {
            check_len(records, field.len())?;
        }
        let fields = transposer.shape().fields();
        self.traverse("interleave", self.plan(records)?, |chunk| {
            let mask = chunk.mask(B::LANES)?;
            let base = chunk.start * fields;
            let span = chunk.len * fields;
            let regs: Vec<B::Register> = fields_in
                .iter()
                .map(|field| load_chunk::<B>(&field[chunk.range()], mask))
                .collect();
            let merged = transposer.interleave::<B>(&regs)?;
            for (k, reg) in merged.into_iter().enumerate() {
                let (lo, hi) = Self::register_span(k, span);
                if hi > lo {
                    store_chunk::<B>(reg, &mut aos[base + lo..base + hi], Self::span_mask(hi - lo));
                }
            }
            Ok(())
        })
    }

    /// Record count of an AoS buffer of `len` elements, after shape checks.
    fn check_records(&self, transposer: &RecordTransposer, len: usize, field_buffers: usize) -> Result<usize> {
        transposer.check_backend::<B>()?;
        let fields = transposer.shape().fields();
        if field_buffers != fields {
            return Err(EngineError::SourceCountMismatch {
                expected: fields,
                actual: field_buffers,
            });
        }
        if len % fields != 0 {
            return Err(EngineError::PartialRecord { len, fields });
        }
        Ok(len / fields)
    }

    /// Element range of AoS register `k` within a span of `span` elements.
    #[inline]
    fn register_span(k: usize, span: usize) -> (usize, usize) {
        ((k * B::LANES).min(span), ((k + 1) * B::LANES).min(span))
    }

    #[inline]
    fn span_mask(len: usize) -> Option<LaneMask> {
        (len < B::LANES).then(|| LaneMask::prefix(len, B::LANES))
    }
}

#[cfg(test)]
mod tests;
