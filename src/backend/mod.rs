// src/backend/mod.rs

//! Backend trait and register operations.
//!
//! A backend is one (element type, lane width) combination. Everything the
//! engine does to a register goes through [`Backend`], so the vectorised
//! path and the one-lane scalar reference run the same code above this
//! layer.
//!
//! # Variants
//!
//! - [`scalar::Scalar`]: one lane, the reference implementation.
//! - [`portable`]: 512-bit registers as lane arrays (`I32x16`, `F32x16`,
//!   `I64x8`). Always available.
//! - `x86`: the same registers on AVX-512 (k-register masks, native
//!   gather/scatter and `vpermd`/`vpermt2d`). Compiled only when the target
//!   enables `avx512f`.
//!
//! The `Native*` aliases pick the best variant the build was compiled for.
//!
//! # Testing the AVX-512 backend
//!
//! A default build never compiles `x86`, so the test suite runs the native
//! aliases on the portable backend. To run the same suite on AVX-512
//! hardware, enable the target features for the whole build:
//!
//! ```text
//! RUSTFLAGS="-C target-feature=+avx512f,+avx512dq" cargo test
//! ```
//!
//! The demo binary logs which variant it was built with, and warns when the
//! CPU supports AVX-512 but the build does not use it.
//!
//! # Preconditions
//!
//! Backend methods assume the caller already validated offsets, masks and
//! permutations (the engine does, and reports typed errors). They still
//! `assert!` the conditions memory safety depends on.

use crate::access::IndexSet;
use crate::element::Element;
use crate::layout::Permutation;
use crate::mask::LaneMask;
use core::fmt::Debug;

pub mod portable;
pub mod scalar;

#[cfg(all(target_arch = "x86_64", target_feature = "avx512f"))]
pub mod x86;

/// A register implementation for one element type and lane width.
pub trait Backend: 'static + Copy + Clone + Debug + Default + Send + Sync {
    /// Element held in each lane.
    type Elem: Element;

    /// The register value type.
    type Register: Copy + Clone + Debug + Send + Sync;

    /// Number of lanes in a register.
    const LANES: usize;

    /// Short name used in log output.
    const NAME: &'static str;

    /// Register width in bytes; aligned accesses must start on a multiple of this.
    #[inline(always)]
    fn register_bytes() -> usize {
        Self::LANES * core::mem::size_of::<Self::Elem>()
    }

    /// Broadcast a scalar across all lanes.
    fn splat(value: Self::Elem) -> Self::Register;

    /// Build a register lane by lane.
    fn from_fn<F: FnMut(usize) -> Self::Elem>(f: F) -> Self::Register;

    /// Read one lane.
    fn lane(register: Self::Register, lane: usize) -> Self::Elem;

    /// Load `LANES` contiguous elements.
    fn load(src: &[Self::Elem]) -> Self::Register;

    /// Load active lanes; inactive lanes become zero and are never read.
    fn load_masked(src: &[Self::Elem], mask: LaneMask) -> Self::Register;

    /// Store all lanes.
    fn store(register: Self::Register, dst: &mut [Self::Elem]);

    /// Store active lanes; memory behind inactive lanes is left untouched.
    fn store_masked(register: Self::Register, dst: &mut [Self::Elem], mask: LaneMask);

    /// Lane `i` = `src[indices[i]]` for active lanes, zero otherwise.
    fn gather(src: &[Self::Elem], indices: &IndexSet, mask: LaneMask) -> Self::Register;

    /// `dst[indices[i]]` = lane `i` for active lanes, lowest lane first.
    fn scatter(dst: &mut [Self::Elem], indices: &IndexSet, register: Self::Register, mask: LaneMask);

    fn add(a: Self::Register, b: Self::Register) -> Self::Register;

    fn mul(a: Self::Register, b: Self::Register) -> Self::Register;

    /// `if_true` on active lanes, `if_false` elsewhere.
    fn select(mask: LaneMask, if_true: Self::Register, if_false: Self::Register) -> Self::Register;

    /// `a + b` on active lanes, `a` elsewhere.
    #[inline(always)]
    fn add_masked(a: Self::Register, b: Self::Register, mask: LaneMask) -> Self::Register {
        Self::select(mask, Self::add(a, b), a)
    }

    /// `a * b` on active lanes, `a` elsewhere.
    #[inline(always)]
    fn mul_masked(a: Self::Register, b: Self::Register, mask: LaneMask) -> Self::Register {
        Self::select(mask, Self::mul(a, b), a)
    }

    /// Single-register lane permutation.
    fn permute(register: Self::Register, perm: &Permutation) -> Self::Register;

    /// Permutation over the concatenation of `registers`.
    #[inline(always)]
    fn permute_many(registers: &[Self::Register], perm: &Permutation) -> Self::Register {
        assert_eq!(registers.len(), perm.inputs());
        assert_eq!(perm.lanes(), Self::LANES);
        Self::from_fn(|lane| {
            let source = perm.source(lane);
            Self::lane(registers[source / Self::LANES], source % Self::LANES)
        })
    }

    /// Copy all lanes out, lowest first.
    fn to_vec(register: Self::Register) -> Vec<Self::Elem> {
        (0..Self::LANES).map(|lane| Self::lane(register, lane)).collect()
    }
}

// ============================================================================
// Native selection
// ============================================================================

#[cfg(all(target_arch = "x86_64", target_feature = "avx512f"))]
pub type NativeI32 = x86::Avx512I32;
#[cfg(all(target_arch = "x86_64", target_feature = "avx512f"))]
pub type NativeF32 = x86::Avx512F32;
#[cfg(all(target_arch = "x86_64", target_feature = "avx512f"))]
pub type NativeI64 = x86::Avx512I64;

#[cfg(not(all(target_arch = "x86_64", target_feature = "avx512f")))]
pub type NativeI32 = portable::PortableI32;
#[cfg(not(all(target_arch = "x86_64", target_feature = "avx512f")))]
pub type NativeF32 = portable::PortableF32;
#[cfg(not(all(target_arch = "x86_64", target_feature = "avx512f")))]
pub type NativeI64 = portable::PortableI64;

// Shared precondition checks, kept out of line so the hot paths stay small.

#[inline(always)]
pub(crate) fn assert_mask_width(mask: LaneMask, lanes: usize) {
    assert_eq!(mask.lanes(), lanes, "mask width does not match register");
}

#[inline(always)]
pub(crate) fn assert_mask_fits(mask: LaneMask, lanes: usize, len: usize) {
    assert_mask_width(mask, lanes);
    assert!(
        mask.fits_within(len),
        "masked access past the end of a {}-element slice",
        len
    );
}

#[inline(always)]
pub(crate) fn assert_indices_fit(indices: &IndexSet, mask: LaneMask, lanes: usize, len: usize) {
    assert_mask_width(mask, lanes);
    assert_eq!(indices.lanes(), lanes, "index set width does not match register");
    if let Some(max) = indices.max_active(mask) {
        assert!(max < len, "gather/scatter offset {} past length {}", max, len);
    }
}

#[inline(always)]
pub(crate) fn assert_single_source(perm: &Permutation, lanes: usize) {
    assert_eq!(perm.inputs(), 1, "single-register permute given a multi-source permutation");
    assert_eq!(perm.lanes(), lanes, "permutation width does not match register");
}

#[cfg(test)]
mod tests;
