//! Portable 512-bit backend.
//!
//! Registers are plain lane arrays aligned like a ZMM register; every
//! operation is a lane loop the compiler is free to vectorise. Results are
//! identical to the AVX-512 backend, including scatter ordering.

use super::{assert_indices_fit, assert_mask_fits, assert_mask_width, assert_single_source, Backend};
use crate::access::IndexSet;
use crate::element::Element;
use crate::layout::Permutation;
use crate::mask::LaneMask;

macro_rules! portable_backend {
    ($backend:ident, $reg:ident, $t:ty, $lanes:expr, $name:expr) => {
        #[doc = concat!("Portable `", stringify!($t), "` backend, ", stringify!($lanes), " lanes.")]
        #[derive(Copy, Clone, Debug, Default)]
        pub struct $backend;

        #[doc = concat!(stringify!($lanes), " lanes of `", stringify!($t), "`.")]
        #[derive(Copy, Clone, Debug, Default, PartialEq)]
        #[repr(C, align(64))]
        pub struct $reg(pub [$t; $lanes]);

        impl Backend for $backend {
            type Elem = $t;
            type Register = $reg;
            const LANES: usize = $lanes;
            const NAME: &'static str = $name;

            #[inline(always)]
            fn splat(value: $t) -> $reg {
                $reg([value; $lanes])
            }

            #[inline(always)]
            fn from_fn<F: FnMut(usize) -> $t>(f: F) -> $reg {
                $reg(core::array::from_fn(f))
            }

            #[inline(always)]
            fn lane(register: $reg, lane: usize) -> $t {
                register.0[lane]
            }

            #[inline(always)]
            fn load(src: &[$t]) -> $reg {
                assert!(src.len() >= $lanes, "load needs {} elements, got {}", $lanes, src.len());
                let mut out = [<$t as Element>::ZERO; $lanes];
                out.copy_from_slice(&src[..$lanes]);
                $reg(out)
            }

            #[inline(always)]
            fn load_masked(src: &[$t], mask: LaneMask) -> $reg {
                assert_mask_fits(mask, $lanes, src.len());
                let mut out = [<$t as Element>::ZERO; $lanes];
                for lane in mask.active_lanes() {
                    out[lane] = src[lane];
                }
                $reg(out)
            }

            #[inline(always)]
            fn store(register: $reg, dst: &mut [$t]) {
                assert!(dst.len() >= $lanes, "store needs {} elements, got {}", $lanes, dst.len());
                dst[..$lanes].copy_from_slice(&register.0);
            }

            #[inline(always)]
            fn store_masked(register: $reg, dst: &mut [$t], mask: LaneMask) {
                assert_mask_fits(mask, $lanes, dst.len());
                for lane in mask.active_lanes() {
                    dst[lane] = register.0[lane];
                }
            }

            #[inline(always)]
            fn gather(src: &[$t], indices: &IndexSet, mask: LaneMask) -> $reg {
                assert_indices_fit(indices, mask, $lanes, src.len());
                let mut out = [<$t as Element>::ZERO; $lanes];
                for lane in mask.active_lanes() {
                    out[lane] = src[indices.get(lane)];
                }
                $reg(out)
            }

            #[inline(always)]
            fn scatter(dst: &mut [$t], indices: &IndexSet, register: $reg, mask: LaneMask) {
                assert_indices_fit(indices, mask, $lanes, dst.len());
                // Ascending lane order: the highest colliding lane lands last.
                for lane in mask.active_lanes() {
                    dst[indices.get(lane)] = register.0[lane];
                }
            }

            #[inline(always)]
            fn add(a: $reg, b: $reg) -> $reg {
                $reg(core::array::from_fn(|i| a.0[i].lane_add(b.0[i])))
            }

            #[inline(always)]
            fn mul(a: $reg, b: $reg) -> $reg {
                $reg(core::array::from_fn(|i| a.0[i].lane_mul(b.0[i])))
            }

            #[inline(always)]
            fn select(mask: LaneMask, if_true: $reg, if_false: $reg) -> $reg {
                assert_mask_width(mask, $lanes);
                $reg(core::array::from_fn(|i| {
                    if mask.is_active(i) {
                        if_true.0[i]
                    } else {
                        if_false.0[i]
                    }
                }))
            }

            #[inline(always)]
            fn permute(register: $reg, perm: &Permutation) -> $reg {
                assert_single_source(perm, $lanes);
                $reg(core::array::from_fn(|i| register.0[perm.source(i)]))
            }
        }
    };
}

portable_backend!(PortableI32, I32x16, i32, 16, "portable-i32x16");
portable_backend!(PortableF32, F32x16, f32, 16, "portable-f32x16");
portable_backend!(PortableI64, I64x8, i64, 8, "portable-i64x8");
