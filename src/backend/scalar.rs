// src/backend/scalar.rs

//! Scalar reference backend (LANES=1).
//!
//! One lane, plain element arithmetic. Running the engine on this backend is
//! the sequential per-element computation the vector backends must match.

use super::{assert_indices_fit, assert_mask_fits, assert_mask_width, assert_single_source, Backend};
use crate::access::IndexSet;
use crate::element::Element;
use crate::layout::Permutation;
use crate::mask::LaneMask;
use core::marker::PhantomData;

/// A scalar backend with 1 lane.
#[derive(Copy, Clone, Debug, Default)]
pub struct Scalar<T>(PhantomData<T>);

/// A register containing a single value.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[repr(transparent)]
pub struct ScalarReg<T>(pub T);

impl<T: Element> Backend for Scalar<T> {
    type Elem = T;
    type Register = ScalarReg<T>;
    const LANES: usize = 1;
    const NAME: &'static str = "scalar";

    #[inline(always)]
    fn splat(value: T) -> ScalarReg<T> {
        ScalarReg(value)
    }

    #[inline(always)]
    fn from_fn<F: FnMut(usize) -> T>(mut f: F) -> ScalarReg<T> {
        ScalarReg(f(0))
    }

    #[inline(always)]
    fn lane(register: ScalarReg<T>, lane: usize) -> T {
        assert_eq!(lane, 0, "scalar register has one lane");
        register.0
    }

    #[inline(always)]
    fn load(src: &[T]) -> ScalarReg<T> {
        ScalarReg(src[0])
    }

    #[inline(always)]
    fn load_masked(src: &[T], mask: LaneMask) -> ScalarReg<T> {
        assert_mask_fits(mask, 1, src.len());
        if mask.is_active(0) {
            ScalarReg(src[0])
        } else {
            ScalarReg(T::ZERO)
        }
    }

    #[inline(always)]
    fn store(register: ScalarReg<T>, dst: &mut [T]) {
        dst[0] = register.0;
    }

    #[inline(always)]
    fn store_masked(register: ScalarReg<T>, dst: &mut [T], mask: LaneMask) {
        assert_mask_fits(mask, 1, dst.len());
        if mask.is_active(0) {
            dst[0] = register.0;
        }
    }

    #[inline(always)]
    fn gather(src: &[T], indices: &IndexSet, mask: LaneMask) -> ScalarReg<T> {
        assert_indices_fit(indices, mask, 1, src.len());
        if mask.is_active(0) {
            ScalarReg(src[indices.get(0)])
        } else {
            ScalarReg(T::ZERO)
        }
    }

    #[inline(always)]
    fn scatter(dst: &mut [T], indices: &IndexSet, register: ScalarReg<T>, mask: LaneMask) {
        assert_indices_fit(indices, mask, 1, dst.len());
        if mask.is_active(0) {
            dst[indices.get(0)] = register.0;
        }
    }

    #[inline(always)]
    fn add(a: ScalarReg<T>, b: ScalarReg<T>) -> ScalarReg<T> {
        ScalarReg(a.0.lane_add(b.0))
    }

    #[inline(always)]
    fn mul(a: ScalarReg<T>, b: ScalarReg<T>) -> ScalarReg<T> {
        ScalarReg(a.0.lane_mul(b.0))
    }

    #[inline(always)]
    fn select(mask: LaneMask, if_true: ScalarReg<T>, if_false: ScalarReg<T>) -> ScalarReg<T> {
        assert_mask_width(mask, 1);
        if mask.is_active(0) {
            if_true
        } else {
            if_false
        }
    }

    #[inline(always)]
    fn permute(register: ScalarReg<T>, perm: &Permutation) -> ScalarReg<T> {
        assert_single_source(perm, 1);
        register
    }
}
