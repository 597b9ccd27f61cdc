// src/layout.rs

//! # Layout Transposition
//!
//! Array-of-structures data (`[x0 y0 z0 x1 y1 z1 ...]`) is how records are
//! usually written, but a register wants one field per lane group
//! (`[x0 x1 ... y0 y1 ... z0 z1 ...]`). This module builds the lane
//! permutations that convert between the two.
//!
//! ## Permutations
//!
//! A [`Permutation`] names, for every destination lane, the source lane it
//! copies. With `inputs > 1` the sources index the concatenation of several
//! registers, which is how three AoS registers are split into x/y/z field
//! registers. Permutations need not be bijections.
//!
//! ## Record shapes
//!
//! A [`RecordShape`] of `F` fields on a `W`-lane register holds `W / F`
//! whole records per register. When `F` does not divide `W`, the top
//! `W mod F` lanes are dead: the single-register permutations map them to
//! themselves and [`RecordShape::lane_mask`] leaves them out, so the
//! transposer and the store mask always agree on which lanes carry data.

use crate::backend::Backend;
use crate::element::Element;
use crate::error::{EngineError, Result};
use crate::kernel::{self, BinaryOp, Op};
use crate::mask::{LaneMask, MAX_LANES};
use log::debug;
use std::fmt;

/// Destination lane `i` takes concatenated source lane `source(i)`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Permutation {
    sources: Vec<usize>,
    inputs: usize,
    /// `sources` as 32-bit lane indices, ready for an index-vector load.
    lane_indices: Vec<i32>,
}

impl Permutation {
    /// Single-register permutation; `sources.len()` is the lane count.
    pub fn new(sources: Vec<usize>) -> Result<Self> {
        Self::multi(sources, 1)
    }

    /// Permutation over the concatenation of `inputs` registers.
    pub fn multi(sources: Vec<usize>, inputs: usize) -> Result<Self> {
        if inputs == 0 {
            return Err(EngineError::SourceCountMismatch {
                expected: 1,
                actual: 0,
            });
        }
        let limit = sources.len() * inputs;
        if let Some((lane, &selected)) = sources.iter().enumerate().find(|&(_, &s)| s >= limit) {
            return Err(EngineError::InvalidPermutationSource {
                lane,
                selected,
                limit,
            });
        }
        Ok(Self::from_parts(sources, inputs))
    }

    pub fn identity(lanes: usize) -> Self {
        Self::from_parts((0..lanes).collect(), 1)
    }

    /// Sources must already be below `lanes * inputs`.
    fn from_parts(sources: Vec<usize>, inputs: usize) -> Self {
        let lane_indices = sources
            .iter()
            .map(|&s| i32::try_from(s).unwrap_or(i32::MAX))
            .collect();
        Self {
            sources,
            inputs,
            lane_indices,
        }
    }

    #[inline(always)]
    pub fn lanes(&self) -> usize {
        self.sources.len()
    }

    /// Number of source registers this permutation reads.
    #[inline(always)]
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    #[inline(always)]
    pub fn source(&self, lane: usize) -> usize {
        self.sources[lane]
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[usize] {
        &self.sources
    }

    /// The sources as `i32` lane indices, computed once at construction.
    #[inline(always)]
    pub fn lane_indices(&self) -> &[i32] {
        &self.lane_indices
    }

    /// Whether every source lane is used exactly once.
    pub fn is_bijection(&self) -> bool {
        if self.inputs != 1 {
            return false;
        }
        let mut seen = vec![false; self.lanes()];
        self.sources
            .iter()
            .all(|&s| !std::mem::replace(&mut seen[s], true))
    }

    /// The permutation that undoes this one.
    pub fn inverse(&self) -> Result<Self> {
        if !self.is_bijection() {
            return Err(EngineError::NotInvertible);
        }
        let mut inverse = vec![0; self.lanes()];
        for (dest, &source) in self.sources.iter().enumerate() {
            inverse[source] = dest;
        }
        Ok(Self::from_parts(inverse, 1))
    }

    /// Apply `self` first, then `next`, as one permutation.
    pub fn then(&self, next: &Permutation) -> Result<Self> {
        if self.inputs != 1 || next.inputs != 1 {
            return Err(EngineError::SourceCountMismatch {
                expected: 1,
                actual: self.inputs.max(next.inputs),
            });
        }
        if next.lanes() != self.lanes() {
            return Err(EngineError::LaneCountMismatch {
                expected: self.lanes(),
                actual: next.lanes(),
            });
        }
        Ok(Self::from_parts(
            next.sources.iter().map(|&s| self.sources[s]).collect(),
            1,
        ))
    }
}

impl fmt::Debug for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inputs == 1 {
            write!(f, "Permutation({:?})", self.sources)
        } else {
            write!(f, "Permutation<{}>({:?})", self.inputs, self.sources)
        }
    }
}

/// Permute one or more source registers into a new register.
pub fn permute<B: Backend>(registers: &[B::Register], perm: &Permutation) -> Result<B::Register> {
    if perm.lanes() != B::LANES {
        return Err(EngineError::LaneCountMismatch {
            expected: B::LANES,
            actual: perm.lanes(),
        });
    }
    if registers.len() != perm.inputs() {
        return Err(EngineError::SourceCountMismatch {
            expected: perm.inputs(),
            actual: registers.len(),
        });
    }
    Ok(match registers {
        [single] => B::permute(*single, perm),
        _ => B::permute_many(registers, perm),
    })
}

// ============================================================================
// Record shapes
// ============================================================================

/// `fields` values per record, laid out on a `lanes`-wide register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordShape {
    fields: usize,
    lanes: usize,
}

impl RecordShape {
    pub fn new(fields: usize, lanes: usize) -> Result<Self> {
        if fields == 0 || fields > lanes || lanes > MAX_LANES {
            return Err(EngineError::InvalidRecordShape { fields, lanes });
        }
        Ok(Self { fields, lanes })
    }

    #[inline]
    pub fn fields(&self) -> usize {
        self.fields
    }

    #[inline]
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Whole records that fit in one register.
    #[inline]
    pub fn records_per_register(&self) -> usize {
        self.lanes / self.fields
    }

    /// Lanes that carry record data.
    #[inline]
    pub fn used_lanes(&self) -> usize {
        self.records_per_register() * self.fields
    }

    /// Whether the field count divides the lane count.
    #[inline]
    pub fn is_exact(&self) -> bool {
        self.used_lanes() == self.lanes
    }

    /// Lanes that carry record data; the rest must never be stored.
    pub fn lane_mask(&self) -> LaneMask {
        LaneMask::from_bits(low_bits(self.used_lanes()), self.lanes)
    }

    /// Field held by SoA lane `lane`, or `None` for a dead lane.
    pub fn field_of_lane(&self, lane: usize) -> Option<usize> {
        (lane < self.used_lanes()).then(|| lane / self.records_per_register())
    }

    /// Single-register AoS → SoA: `[x0 y0 z0 x1 ..]` → `[x0 x1 .. y0 y1 .. z0 ..]`.
    pub fn aos_to_soa(&self) -> Permutation {
        let records = self.records_per_register();
        let sources = (0..self.lanes)
            .map(|lane| {
                if lane < self.used_lanes() {
                    let field = lane / records;
                    let record = lane % records;
                    record * self.fields + field
                } else {
                    lane
                }
            })
            .collect();
        Permutation::from_parts(sources, 1)
    }

    /// Single-register SoA → AoS, the inverse of [`Self::aos_to_soa`].
    pub fn soa_to_aos(&self) -> Permutation {
        let records = self.records_per_register();
        let sources = (0..self.lanes)
            .map(|lane| {
                if lane < self.used_lanes() {
                    let record = lane / self.fields;
                    let field = lane % self.fields;
                    field * records + record
                } else {
                    lane
                }
            })
            .collect();
        Permutation::from_parts(sources, 1)
    }

    /// Pull `field` out of `fields` consecutive AoS registers (`lanes` records).
    pub fn deinterleave_field(&self, field: usize) -> Permutation {
        let sources = (0..self.lanes)
            .map(|record| record * self.fields + field)
            .collect();
        Permutation::from_parts(sources, self.fields)
    }

    /// Build AoS register `index` from `fields` field registers.
    pub fn interleave_register(&self, index: usize) -> Permutation {
        let sources = (0..self.lanes)
            .map(|lane| {
                let element = index * self.lanes + lane;
                let record = element / self.fields;
                let field = element % self.fields;
                field * self.lanes + record
            })
            .collect();
        Permutation::from_parts(sources, self.fields)
    }
}

#[inline(always)]
fn low_bits(count: usize) -> u64 {
    if count >= MAX_LANES {
        u64::MAX
    } else {
        (1u64 << count) - 1
    }
}

// ============================================================================
// Record transposer
// ============================================================================

/// Every permutation a record shape needs, built once and reused per chunk.
#[derive(Debug, Clone)]
pub struct RecordTransposer {
    shape: RecordShape,
    to_soa: Permutation,
    to_aos: Permutation,
    deinterleave: Vec<Permutation>,
    interleave: Vec<Permutation>,
    mask: LaneMask,
}

impl RecordTransposer {
    pub fn new(shape: RecordShape) -> Self {
        let transposer = Self {
            shape,
            to_soa: shape.aos_to_soa(),
            to_aos: shape.soa_to_aos(),
            deinterleave: (0..shape.fields())
                .map(|f| shape.deinterleave_field(f))
                .collect(),
            interleave: (0..shape.fields())
                .map(|k| shape.interleave_register(k))
                .collect(),
            mask: shape.lane_mask(),
        };
        debug!(
            "record transposer: {} fields on {} lanes, {} records/register, mask {:?}",
            shape.fields(),
            shape.lanes(),
            shape.records_per_register(),
            transposer.mask
        );
        transposer
    }

    #[inline]
    pub fn shape(&self) -> RecordShape {
        self.shape
    }

    /// Lanes carrying record data; shared by loads, arithmetic and stores.
    #[inline]
    pub fn lane_mask(&self) -> LaneMask {
        self.mask
    }

    #[inline]
    pub fn to_soa_permutation(&self) -> &Permutation {
        &self.to_soa
    }

    #[inline]
    pub fn to_aos_permutation(&self) -> &Permutation {
        &self.to_aos
    }

    /// Fails unless `B` has the lane count this shape was built for.
    pub fn check_backend<B: Backend>(&self) -> Result<()> {
        if B::LANES != self.shape.lanes() {
            return Err(EngineError::LaneCountMismatch {
                expected: self.shape.lanes(),
                actual: B::LANES,
            });
        }
        Ok(())
    }

    /// Regroup one AoS register into SoA lane groups.
    pub fn to_soa<B: Backend>(&self, register: B::Register) -> Result<B::Register> {
        permute::<B>(&[register], &self.to_soa)
    }

    /// Restore one SoA register to AoS order.
    pub fn to_aos<B: Backend>(&self, register: B::Register) -> Result<B::Register> {
        permute::<B>(&[register], &self.to_aos)
    }

    /// Split `fields` AoS registers (one register of records) into one register per field.
    pub fn deinterleave<B: Backend>(&self, aos: &[B::Register]) -> Result<Vec<B::Register>> {
        self.check_backend::<B>()?;
        self.deinterleave
            .iter()
            .map(|perm| permute::<B>(aos, perm))
            .collect()
    }

    /// Merge one register per field back into `fields` AoS registers.
    pub fn interleave<B: Backend>(&self, fields: &[B::Register]) -> Result<Vec<B::Register>> {
        self.check_backend::<B>()?;
        self.interleave
            .iter()
            .map(|perm| permute::<B>(fields, perm))
            .collect()
    }

    /// SoA-ordered operand with `values[f]` in every lane of field `f`.
    ///
    /// Dead lanes hold zero.
    pub fn field_operand<B: Backend>(&self, values: &[B::Elem]) -> Result<B::Register> {
        self.check_backend::<B>()?;
        if values.len() != self.shape.fields() {
            return Err(EngineError::BufferLengthMismatch {
                expected: self.shape.fields(),
                actual: values.len(),
            });
        }
        Ok(B::from_fn(|lane| match self.shape.field_of_lane(lane) {
            Some(field) => values[field],
            None => <B::Elem as Element>::ZERO,
        }))
    }

    /// Regroup to SoA, combine field-wise with `operand`, restore AoS order.
    ///
    /// Only the record lanes are computed; dead lanes pass through.
    pub fn apply_fieldwise<B: Backend>(
        &self,
        op: BinaryOp,
        register: B::Register,
        operand: B::Register,
    ) -> Result<B::Register> {
        let soa = self.to_soa::<B>(register)?;
        let soa = kernel::apply::<B>(&Op::from(op), soa, operand, Some(self.mask))?;
        self.to_aos::<B>(soa)
    }
}
