//! x86_64 AVX-512 backend.
//!
//! Masks map straight onto k-registers (`__mmask16` / `__mmask8`), so masked
//! loads and stores never touch memory behind inactive lanes. Gathers and
//! scatters use the hardware instructions with element-scaled offsets;
//! hardware scatter writes lanes from the lowest mask bit upward, which is
//! what makes the highest colliding lane win.

use super::{assert_indices_fit, assert_mask_fits, assert_mask_width, assert_single_source, Backend};
use crate::access::IndexSet;
use crate::layout::Permutation;
use crate::mask::LaneMask;
use core::arch::x86_64::*;
use core::fmt::{Debug, Formatter};

/// Offsets that do not fit the instruction's index width take the lane loop.
#[inline(always)]
fn fits_i32(indices: &IndexSet, mask: LaneMask) -> bool {
    indices
        .max_active(mask)
        .map_or(true, |max| max <= i32::MAX as usize)
}

#[inline(always)]
fn fits_i64(indices: &IndexSet, mask: LaneMask) -> bool {
    indices
        .max_active(mask)
        .map_or(true, |max| max <= i64::MAX as usize)
}

/// Offsets as an i32 index vector; inactive lanes are zeroed.
#[inline(always)]
unsafe fn offsets_epi32(indices: &IndexSet, mask: LaneMask) -> __m512i {
    let mut raw = [0i32; 16];
    for lane in mask.active_lanes() {
        raw[lane] = indices.get(lane) as i32;
    }
    _mm512_loadu_epi32(raw.as_ptr())
}

#[inline(always)]
unsafe fn offsets_epi64(indices: &IndexSet, mask: LaneMask) -> __m512i {
    let mut raw = [0i64; 8];
    for lane in mask.active_lanes() {
        raw[lane] = indices.get(lane) as i64;
    }
    _mm512_loadu_epi64(raw.as_ptr())
}

/// Index vector straight from the permutation's cached lane indices.
#[inline(always)]
unsafe fn permute_index_epi32(perm: &Permutation) -> __m512i {
    let indices = perm.lane_indices();
    _mm512_loadu_epi32(indices.as_ptr())
}

/// Eight cached `i32` indices, sign-extended to 64-bit lanes.
#[inline(always)]
unsafe fn permute_index_epi64(perm: &Permutation) -> __m512i {
    let indices = perm.lane_indices();
    _mm512_cvtepi32_epi64(_mm256_loadu_si256(indices.as_ptr().cast()))
}

// ============================================================================
// i32 x 16
// ============================================================================

/// AVX-512 `i32` backend (16 lanes).
#[derive(Copy, Clone, Debug, Default)]
pub struct Avx512I32;

/// 16 lanes of `i32` in a ZMM register.
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct I32x16(__m512i);

impl Default for I32x16 {
    fn default() -> Self {
        unsafe { Self(_mm512_setzero_si512()) }
    }
}

impl Debug for I32x16 {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "I32x16({:?})", Avx512I32::to_vec(*self))
    }
}

impl Backend for Avx512I32 {
    type Elem = i32;
    type Register = I32x16;
    const LANES: usize = 16;
    const NAME: &'static str = "avx512-i32x16";

    #[inline(always)]
    fn splat(value: i32) -> I32x16 {
        unsafe { I32x16(_mm512_set1_epi32(value)) }
    }

    #[inline(always)]
    fn from_fn<F: FnMut(usize) -> i32>(f: F) -> I32x16 {
        let raw: [i32; 16] = core::array::from_fn(f);
        unsafe { I32x16(_mm512_loadu_epi32(raw.as_ptr())) }
    }

    #[inline(always)]
    fn lane(register: I32x16, lane: usize) -> i32 {
        let mut raw = [0i32; 16];
        unsafe { _mm512_storeu_epi32(raw.as_mut_ptr(), register.0) };
        raw[lane]
    }

    #[inline(always)]
    fn load(src: &[i32]) -> I32x16 {
        assert!(src.len() >= 16, "load needs 16 elements, got {}", src.len());
        unsafe { I32x16(_mm512_loadu_epi32(src.as_ptr())) }
    }

    #[inline(always)]
    fn load_masked(src: &[i32], mask: LaneMask) -> I32x16 {
        assert_mask_fits(mask, 16, src.len());
        unsafe { I32x16(_mm512_maskz_loadu_epi32(mask.bits() as __mmask16, src.as_ptr())) }
    }

    #[inline(always)]
    fn store(register: I32x16, dst: &mut [i32]) {
        assert!(dst.len() >= 16, "store needs 16 elements, got {}", dst.len());
        unsafe { _mm512_storeu_epi32(dst.as_mut_ptr(), register.0) }
    }

    #[inline(always)]
    fn store_masked(register: I32x16, dst: &mut [i32], mask: LaneMask) {
        assert_mask_fits(mask, 16, dst.len());
        unsafe { _mm512_mask_storeu_epi32(dst.as_mut_ptr(), mask.bits() as __mmask16, register.0) }
    }

    #[inline(always)]
    fn gather(src: &[i32], indices: &IndexSet, mask: LaneMask) -> I32x16 {
        assert_indices_fit(indices, mask, 16, src.len());
        if !fits_i32(indices, mask) {
            return Self::from_fn(|lane| if mask.is_active(lane) { src[indices.get(lane)] } else { 0 });
        }
        unsafe {
            let offsets = offsets_epi32(indices, mask);
            I32x16(_mm512_mask_i32gather_epi32::<4>(
                _mm512_setzero_si512(),
                mask.bits() as __mmask16,
                offsets,
                src.as_ptr().cast(),
            ))
        }
    }

    #[inline(always)]
    fn scatter(dst: &mut [i32], indices: &IndexSet, register: I32x16, mask: LaneMask) {
        assert_indices_fit(indices, mask, 16, dst.len());
        if !fits_i32(indices, mask) {
            for lane in mask.active_lanes() {
                dst[indices.get(lane)] = Self::lane(register, lane);
            }
            return;
        }
        unsafe {
            let offsets = offsets_epi32(indices, mask);
            _mm512_mask_i32scatter_epi32::<4>(
                dst.as_mut_ptr().cast(),
                mask.bits() as __mmask16,
                offsets,
                register.0,
            )
        }
    }

    #[inline(always)]
    fn add(a: I32x16, b: I32x16) -> I32x16 {
        unsafe { I32x16(_mm512_add_epi32(a.0, b.0)) }
    }

    #[inline(always)]
    fn mul(a: I32x16, b: I32x16) -> I32x16 {
        unsafe { I32x16(_mm512_mullo_epi32(a.0, b.0)) }
    }

    #[inline(always)]
    fn select(mask: LaneMask, if_true: I32x16, if_false: I32x16) -> I32x16 {
        assert_mask_width(mask, 16);
        unsafe { I32x16(_mm512_mask_blend_epi32(mask.bits() as __mmask16, if_false.0, if_true.0)) }
    }

    #[inline(always)]
    fn add_masked(a: I32x16, b: I32x16, mask: LaneMask) -> I32x16 {
        assert_mask_width(mask, 16);
        unsafe { I32x16(_mm512_mask_add_epi32(a.0, mask.bits() as __mmask16, a.0, b.0)) }
    }

    #[inline(always)]
    fn mul_masked(a: I32x16, b: I32x16, mask: LaneMask) -> I32x16 {
        assert_mask_width(mask, 16);
        unsafe { I32x16(_mm512_mask_mullo_epi32(a.0, mask.bits() as __mmask16, a.0, b.0)) }
    }

    #[inline(always)]
    fn permute(register: I32x16, perm: &Permutation) -> I32x16 {
        assert_single_source(perm, 16);
        unsafe { I32x16(_mm512_permutexvar_epi32(permute_index_epi32(perm), register.0)) }
    }

    #[inline(always)]
    fn permute_many(registers: &[I32x16], perm: &Permutation) -> I32x16 {
        assert_eq!(registers.len(), perm.inputs());
        assert_eq!(perm.lanes(), 16);
        match registers {
            [a, b] => unsafe {
                I32x16(_mm512_permutex2var_epi32(a.0, permute_index_epi32(perm), b.0))
            },
            _ => Self::from_fn(|lane| {
                let source = perm.source(lane);
                Self::lane(registers[source / 16], source % 16)
            }),
        }
    }
}

// ============================================================================
// f32 x 16
// ============================================================================

/// AVX-512 `f32` backend (16 lanes).
#[derive(Copy, Clone, Debug, Default)]
pub struct Avx512F32;

/// 16 lanes of `f32` in a ZMM register.
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct F32x16(__m512);

impl Default for F32x16 {
    fn default() -> Self {
        unsafe { Self(_mm512_setzero_ps()) }
    }
}

impl Debug for F32x16 {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "F32x16({:?})", Avx512F32::to_vec(*self))
    }
}

impl Backend for Avx512F32 {
    type Elem = f32;
    type Register = F32x16;
    const LANES: usize = 16;
    const NAME: &'static str = "avx512-f32x16";

    #[inline(always)]
    fn splat(value: f32) -> F32x16 {
        unsafe { F32x16(_mm512_set1_ps(value)) }
    }

    #[inline(always)]
    fn from_fn<F: FnMut(usize) -> f32>(f: F) -> F32x16 {
        let raw: [f32; 16] = core::array::from_fn(f);
        unsafe { F32x16(_mm512_loadu_ps(raw.as_ptr())) }
    }

    #[inline(always)]
    fn lane(register: F32x16, lane: usize) -> f32 {
        let mut raw = [0.0f32; 16];
        unsafe { _mm512_storeu_ps(raw.as_mut_ptr(), register.0) };
        raw[lane]
    }

    #[inline(always)]
    fn load(src: &[f32]) -> F32x16 {
        assert!(src.len() >= 16, "load needs 16 elements, got {}", src.len());
        unsafe { F32x16(_mm512_loadu_ps(src.as_ptr())) }
    }

    #[inline(always)]
    fn load_masked(src: &[f32], mask: LaneMask) -> F32x16 {
        assert_mask_fits(mask, 16, src.len());
        unsafe { F32x16(_mm512_maskz_loadu_ps(mask.bits() as __mmask16, src.as_ptr())) }
    }

    #[inline(always)]
    fn store(register: F32x16, dst: &mut [f32]) {
        assert!(dst.len() >= 16, "store needs 16 elements, got {}", dst.len());
        unsafe { _mm512_storeu_ps(dst.as_mut_ptr(), register.0) }
    }

    #[inline(always)]
    fn store_masked(register: F32x16, dst: &mut [f32], mask: LaneMask) {
        assert_mask_fits(mask, 16, dst.len());
        unsafe { _mm512_mask_storeu_ps(dst.as_mut_ptr(), mask.bits() as __mmask16, register.0) }
    }

    #[inline(always)]
    fn gather(src: &[f32], indices: &IndexSet, mask: LaneMask) -> F32x16 {
        assert_indices_fit(indices, mask, 16, src.len());
        if !fits_i32(indices, mask) {
            return Self::from_fn(|lane| if mask.is_active(lane) { src[indices.get(lane)] } else { 0.0 });
        }
        unsafe {
            let offsets = offsets_epi32(indices, mask);
            F32x16(_mm512_mask_i32gather_ps::<4>(
                _mm512_setzero_ps(),
                mask.bits() as __mmask16,
                offsets,
                src.as_ptr().cast(),
            ))
        }
    }

    #[inline(always)]
    fn scatter(dst: &mut [f32], indices: &IndexSet, register: F32x16, mask: LaneMask) {
        assert_indices_fit(indices, mask, 16, dst.len());
        if !fits_i32(indices, mask) {
            for lane in mask.active_lanes() {
                dst[indices.get(lane)] = Self::lane(register, lane);
            }
            return;
        }
        unsafe {
            let offsets = offsets_epi32(indices, mask);
            _mm512_mask_i32scatter_ps::<4>(
                dst.as_mut_ptr().cast(),
                mask.bits() as __mmask16,
                offsets,
                register.0,
            )
        }
    }

    #[inline(always)]
    fn add(a: F32x16, b: F32x16) -> F32x16 {
        unsafe { F32x16(_mm512_add_ps(a.0, b.0)) }
    }

    #[inline(always)]
    fn mul(a: F32x16, b: F32x16) -> F32x16 {
        unsafe { F32x16(_mm512_mul_ps(a.0, b.0)) }
    }

    #[inline(always)]
    fn select(mask: LaneMask, if_true: F32x16, if_false: F32x16) -> F32x16 {
        assert_mask_width(mask, 16);
        unsafe { F32x16(_mm512_mask_blend_ps(mask.bits() as __mmask16, if_false.0, if_true.0)) }
    }

    #[inline(always)]
    fn add_masked(a: F32x16, b: F32x16, mask: LaneMask) -> F32x16 {
        assert_mask_width(mask, 16);
        unsafe { F32x16(_mm512_mask_add_ps(a.0, mask.bits() as __mmask16, a.0, b.0)) }
    }

    #[inline(always)]
    fn mul_masked(a: F32x16, b: F32x16, mask: LaneMask) -> F32x16 {
        assert_mask_width(mask, 16);
        unsafe { F32x16(_mm512_mask_mul_ps(a.0, mask.bits() as __mmask16, a.0, b.0)) }
    }

    #[inline(always)]
    fn permute(register: F32x16, perm: &Permutation) -> F32x16 {
        assert_single_source(perm, 16);
        unsafe { F32x16(_mm512_permutexvar_ps(permute_index_epi32(perm), register.0)) }
    }

    #[inline(always)]
    fn permute_many(registers: &[F32x16], perm: &Permutation) -> F32x16 {
        assert_eq!(registers.len(), perm.inputs());
        assert_eq!(perm.lanes(), 16);
        match registers {
            [a, b] => unsafe {
                F32x16(_mm512_permutex2var_ps(a.0, permute_index_epi32(perm), b.0))
            },
            _ => Self::from_fn(|lane| {
                let source = perm.source(lane);
                Self::lane(registers[source / 16], source % 16)
            }),
        }
    }
}

// ============================================================================
// i64 x 8
// ============================================================================

/// AVX-512 `i64` backend (8 lanes).
#[derive(Copy, Clone, Debug, Default)]
pub struct Avx512I64;

/// 8 lanes of `i64` in a ZMM register.
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct I64x8(__m512i);

impl Default for I64x8 {
    fn default() -> Self {
        unsafe { Self(_mm512_setzero_si512()) }
    }
}

impl Debug for I64x8 {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "I64x8({:?})", Avx512I64::to_vec(*self))
    }
}

impl Backend for Avx512I64 {
    type Elem = i64;
    type Register = I64x8;
    const LANES: usize = 8;
    const NAME: &'static str = "avx512-i64x8";

    #[inline(always)]
    fn splat(value: i64) -> I64x8 {
        unsafe { I64x8(_mm512_set1_epi64(value)) }
    }

    #[inline(always)]
    fn from_fn<F: FnMut(usize) -> i64>(f: F) -> I64x8 {
        let raw: [i64; 8] = core::array::from_fn(f);
        unsafe { I64x8(_mm512_loadu_epi64(raw.as_ptr())) }
    }

    #[inline(always)]
    fn lane(register: I64x8, lane: usize) -> i64 {
        let mut raw = [0i64; 8];
        unsafe { _mm512_storeu_epi64(raw.as_mut_ptr(), register.0) };
        raw[lane]
    }

    #[inline(always)]
    fn load(src: &[i64]) -> I64x8 {
        assert!(src.len() >= 8, "load needs 8 elements, got {}", src.len());
        unsafe { I64x8(_mm512_loadu_epi64(src.as_ptr())) }
    }

    #[inline(always)]
    fn load_masked(src: &[i64], mask: LaneMask) -> I64x8 {
        assert_mask_fits(mask, 8, src.len());
        unsafe { I64x8(_mm512_maskz_loadu_epi64(mask.bits() as __mmask8, src.as_ptr())) }
    }

    #[inline(always)]
    fn store(register: I64x8, dst: &mut [i64]) {
        assert!(dst.len() >= 8, "store needs 8 elements, got {}", dst.len());
        unsafe { _mm512_storeu_epi64(dst.as_mut_ptr(), register.0) }
    }

    #[inline(always)]
    fn store_masked(register: I64x8, dst: &mut [i64], mask: LaneMask) {
        assert_mask_fits(mask, 8, dst.len());
        unsafe { _mm512_mask_storeu_epi64(dst.as_mut_ptr(), mask.bits() as __mmask8, register.0) }
    }

    #[inline(always)]
    fn gather(src: &[i64], indices: &IndexSet, mask: LaneMask) -> I64x8 {
        assert_indices_fit(indices, mask, 8, src.len());
        if !fits_i64(indices, mask) {
            return Self::from_fn(|lane| if mask.is_active(lane) { src[indices.get(lane)] } else { 0 });
        }
        unsafe {
            let offsets = offsets_epi64(indices, mask);
            I64x8(_mm512_mask_i64gather_epi64::<8>(
                _mm512_setzero_si512(),
                mask.bits() as __mmask8,
                offsets,
                src.as_ptr().cast(),
            ))
        }
    }

    #[inline(always)]
    fn scatter(dst: &mut [i64], indices: &IndexSet, register: I64x8, mask: LaneMask) {
        assert_indices_fit(indices, mask, 8, dst.len());
        if !fits_i64(indices, mask) {
            for lane in mask.active_lanes() {
                dst[indices.get(lane)] = Self::lane(register, lane);
            }
            return;
        }
        unsafe {
            let offsets = offsets_epi64(indices, mask);
            _mm512_mask_i64scatter_epi64::<8>(
                dst.as_mut_ptr().cast(),
                mask.bits() as __mmask8,
                offsets,
                register.0,
            )
        }
    }

    #[inline(always)]
    fn add(a: I64x8, b: I64x8) -> I64x8 {
        unsafe { I64x8(_mm512_add_epi64(a.0, b.0)) }
    }

    #[inline(always)]
    fn mul(a: I64x8, b: I64x8) -> I64x8 {
        unsafe { I64x8(_mm512_mullox_epi64(a.0, b.0)) }
    }

    #[inline(always)]
    fn select(mask: LaneMask, if_true: I64x8, if_false: I64x8) -> I64x8 {
        assert_mask_width(mask, 8);
        unsafe { I64x8(_mm512_mask_blend_epi64(mask.bits() as __mmask8, if_false.0, if_true.0)) }
    }

    #[inline(always)]
    fn add_masked(a: I64x8, b: I64x8, mask: LaneMask) -> I64x8 {
        assert_mask_width(mask, 8);
        unsafe { I64x8(_mm512_mask_add_epi64(a.0, mask.bits() as __mmask8, a.0, b.0)) }
    }

    #[inline(always)]
    fn mul_masked(a: I64x8, b: I64x8, mask: LaneMask) -> I64x8 {
        assert_mask_width(mask, 8);
        unsafe { I64x8(_mm512_mask_mullox_epi64(a.0, mask.bits() as __mmask8, a.0, b.0)) }
    }

    #[inline(always)]
    fn permute(register: I64x8, perm: &Permutation) -> I64x8 {
        assert_single_source(perm, 8);
        unsafe { I64x8(_mm512_permutexvar_epi64(permute_index_epi64(perm), register.0)) }
    }

    #[inline(always)]
    fn permute_many(registers: &[I64x8], perm: &Permutation) -> I64x8 {
        assert_eq!(registers.len(), perm.inputs());
        assert_eq!(perm.lanes(), 8);
        match registers {
            [a, b] => unsafe {
                I64x8(_mm512_permutex2var_epi64(a.0, permute_index_epi64(perm), b.0))
            },
            _ => Self::from_fn(|lane| {
                let source = perm.source(lane);
                Self::lane(registers[source / 8], source % 8)
            }),
        }
    }
}
