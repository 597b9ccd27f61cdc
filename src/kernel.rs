// src/kernel.rs

//! Vector arithmetic kernel.
//!
//! Every operation here is lane-independent and must match a per-lane
//! scalar loop bit for bit: integers wrap at their native width, floats
//! round once per operation (no fused multiply-add contraction).
//!
//! Under a mask, inactive output lanes carry the first operand through
//! unchanged (merge masking, like `_mm512_mask_add_*` with `src = a`).

use crate::backend::Backend;
use crate::element::Element;
use crate::error::{EngineError, Result};
use crate::layout::Permutation;
use crate::mask::LaneMask;
use serde::{Deserialize, Serialize};

/// A lane-wise binary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Multiply,
}

impl BinaryOp {
    /// Scalar semantics of the operation for one lane.
    #[inline(always)]
    pub fn eval<T: Element>(self, a: T, b: T) -> T {
        match self {
            BinaryOp::Add => a.lane_add(b),
            BinaryOp::Multiply => a.lane_mul(b),
        }
    }

    #[inline(always)]
    fn run<B: Backend>(self, a: B::Register, b: B::Register) -> B::Register {
        match self {
            BinaryOp::Add => B::add(a, b),
            BinaryOp::Multiply => B::mul(a, b),
        }
    }

    #[inline(always)]
    fn run_masked<B: Backend>(self, a: B::Register, b: B::Register, mask: LaneMask) -> B::Register {
        match self {
            BinaryOp::Add => B::add_masked(a, b, mask),
            BinaryOp::Multiply => B::mul_masked(a, b, mask),
        }
    }
}

/// Permute both operands, combine the lanes of `lanes`, permute back.
///
/// Lanes outside `lanes` keep the permuted first operand, so with a
/// bijective `forward` they come back to where they started.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedOp {
    forward: Permutation,
    backward: Permutation,
    inner: BinaryOp,
    lanes: LaneMask,
}

impl FusedOp {
    /// `backward` is derived as the inverse of `forward`.
    pub fn new(forward: Permutation, inner: BinaryOp, lanes: LaneMask) -> Result<Self> {
        let backward = forward.inverse()?;
        Self::with_backward(forward, backward, inner, lanes)
    }

    /// Explicit `backward`, for callers that relabel lanes on the way out.
    pub fn with_backward(
        forward: Permutation,
        backward: Permutation,
        inner: BinaryOp,
        lanes: LaneMask,
    ) -> Result<Self> {
        for perm in [&forward, &backward] {
            if perm.inputs() != 1 {
                return Err(EngineError::SourceCountMismatch {
                    expected: 1,
                    actual: perm.inputs(),
                });
            }
        }
        let width = forward.lanes();
        for actual in [backward.lanes(), lanes.lanes()] {
            if actual != width {
                return Err(EngineError::LaneCountMismatch {
                    expected: width,
                    actual,
                });
            }
        }
        Ok(Self {
            forward,
            backward,
            inner,
            lanes,
        })
    }

    #[inline]
    pub fn lanes(&self) -> usize {
        self.forward.lanes()
    }

    fn run<B: Backend>(&self, a: B::Register, b: B::Register) -> B::Register {
        let pa = B::permute(a, &self.forward);
        let pb = B::permute(b, &self.forward);
        let mixed = self.inner.run_masked::<B>(pa, pb, self.lanes);
        B::permute(mixed, &self.backward)
    }
}

/// Operation accepted by [`apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Add,
    Multiply,
    Fused(FusedOp),
}

impl From<BinaryOp> for Op {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => Op::Add,
            BinaryOp::Multiply => Op::Multiply,
        }
    }
}

impl From<FusedOp> for Op {
    fn from(op: FusedOp) -> Self {
        Op::Fused(op)
    }
}

fn check_width<B: Backend>(actual: usize) -> Result<()> {
    if actual != B::LANES {
        return Err(EngineError::LaneCountMismatch {
            expected: B::LANES,
            actual,
        });
    }
    Ok(())
}

/// Check that `op` runs on `B` without running it.
pub fn validate<B: Backend>(op: &Op) -> Result<()> {
    match op {
        Op::Fused(fused) => check_width::<B>(fused.lanes()),
        Op::Add | Op::Multiply => Ok(()),
    }
}

/// Apply `op` lane-wise to `a` and `b`, optionally only on `mask` lanes.
pub fn apply<B: Backend>(
    op: &Op,
    a: B::Register,
    b: B::Register,
    mask: Option<LaneMask>,
) -> Result<B::Register> {
    validate::<B>(op)?;
    if let Some(mask) = mask {
        check_width::<B>(mask.lanes())?;
    }
    let out = match (op, mask) {
        (Op::Add, None) => BinaryOp::Add.run::<B>(a, b),
        (Op::Multiply, None) => BinaryOp::Multiply.run::<B>(a, b),
        (Op::Add, Some(mask)) => BinaryOp::Add.run_masked::<B>(a, b, mask),
        (Op::Multiply, Some(mask)) => BinaryOp::Multiply.run_masked::<B>(a, b, mask),
        (Op::Fused(fused), mask) => {
            let out = fused.run::<B>(a, b);
            match mask {
                Some(mask) => B::select(mask, out, a),
                None => out,
            }
        }
    };
    Ok(out)
}

/// [`apply`] with `scalar` broadcast to every lane of the second operand.
pub fn apply_scalar<B: Backend>(
    op: &Op,
    a: B::Register,
    scalar: B::Elem,
    mask: Option<LaneMask>,
) -> Result<B::Register> {
    apply::<B>(op, a, B::splat(scalar), mask)
}
