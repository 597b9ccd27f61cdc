// src/backend/tests.rs

use super::portable::{PortableF32, PortableI32, PortableI64};
use super::scalar::{Scalar, ScalarReg};
use super::{Backend, NativeF32, NativeI32, NativeI64};
use crate::access::IndexSet;
use crate::layout::Permutation;
use crate::mask::LaneMask;

const GUARD: i32 = 0x0BAD_F00D;
const FILL: i32 = 0x5555_5555;

fn masked_store_respects_guards<B: Backend<Elem = i32>>() {
    for remainder in 1..B::LANES {
        let mask = LaneMask::tail(remainder, B::LANES).unwrap();
        let mut buffer = vec![GUARD; B::LANES * 2];
        B::store_masked(B::splat(FILL), &mut buffer, mask);

        for (i, &value) in buffer.iter().enumerate() {
            if i < remainder {
                assert_eq!(value, FILL, "{}: lane {} should be written", B::NAME, i);
            } else {
                assert_eq!(
                    value, GUARD,
                    "{}: guard {} was overwritten with remainder {}",
                    B::NAME, i, remainder
                );
            }
        }
    }
}

fn masked_load_zero_fills<B: Backend<Elem = i32>>() {
    let src: Vec<i32> = (1..=B::LANES as i32).collect();
    for remainder in 1..B::LANES {
        let mask = LaneMask::tail(remainder, B::LANES).unwrap();
        // Only `remainder` elements exist; the rest must never be read.
        let reg = B::load_masked(&src[..remainder], mask);
        let lanes = B::to_vec(reg);
        for (lane, &value) in lanes.iter().enumerate() {
            let expected = if lane < remainder { lane as i32 + 1 } else { 0 };
            assert_eq!(value, expected, "{}: lane {}", B::NAME, lane);
        }
    }
}

fn arithmetic_wraps<B: Backend<Elem = i32>>() {
    let a = B::from_fn(|i| i32::MAX - i as i32);
    let b = B::splat(2);
    let sum = B::to_vec(B::add(a, b));
    let product = B::to_vec(B::mul(a, b));
    for lane in 0..B::LANES {
        let x = i32::MAX - lane as i32;
        assert_eq!(sum[lane], x.wrapping_add(2));
        assert_eq!(product[lane], x.wrapping_mul(2));
    }
}

fn masked_arithmetic_merges_first_operand<B: Backend<Elem = i32>>() {
    let a = B::from_fn(|i| i as i32);
    let b = B::splat(100);
    let mask = LaneMask::from_lanes((0..B::LANES).map(|i| i % 2 == 0));
    let out = B::to_vec(B::add_masked(a, b, mask));
    for (lane, &value) in out.iter().enumerate() {
        let expected = if lane % 2 == 0 { lane as i32 + 100 } else { lane as i32 };
        assert_eq!(value, expected, "{}: lane {}", B::NAME, lane);
    }
}

fn gather_scatter_round_trip<B: Backend<Elem = i32>>() {
    let src: Vec<i32> = (0..128).map(|i| i + 1).collect();
    let indices = IndexSet::strided(3, 7, B::LANES);
    let full = LaneMask::full(B::LANES);

    let reg = B::gather(&src, &indices, full);
    let lanes = B::to_vec(reg);
    for lane in 0..B::LANES {
        assert_eq!(lanes[lane], src[3 + 7 * lane]);
    }

    let mut dst = vec![0; 128];
    B::scatter(&mut dst, &indices, reg, full);
    for (i, &value) in dst.iter().enumerate() {
        let touched = i >= 3 && (i - 3) % 7 == 0 && (i - 3) / 7 < B::LANES;
        assert_eq!(value, if touched { src[i] } else { 0 }, "offset {}", i);
    }
}

fn scatter_collision_highest_lane_wins<B: Backend<Elem = i32>>() {
    let offsets = vec![5; B::LANES];
    let indices = IndexSet::new(offsets, B::LANES).unwrap();
    let mut dst = vec![0; 8];
    B::scatter(&mut dst, &indices, B::from_fn(|i| i as i32 + 1), LaneMask::full(B::LANES));
    assert_eq!(dst[5], B::LANES as i32);
}

fn permute_reverses<B: Backend<Elem = i32>>() {
    let reverse = Permutation::new((0..B::LANES).rev().collect()).unwrap();
    let reg = B::from_fn(|i| i as i32 * 10);
    let out = B::to_vec(B::permute(reg, &reverse));
    for lane in 0..B::LANES {
        assert_eq!(out[lane], (B::LANES - 1 - lane) as i32 * 10);
    }

    let interleave = Permutation::multi(
        (0..B::LANES)
            .map(|i| if i % 2 == 0 { i / 2 } else { B::LANES + i / 2 })
            .collect(),
        2,
    )
    .unwrap();
    let a = B::from_fn(|i| i as i32);
    let b = B::from_fn(|i| -(i as i32));
    let out = B::to_vec(B::permute_many(&[a, b], &interleave));
    for lane in 0..B::LANES {
        let expected = if lane % 2 == 0 { (lane / 2) as i32 } else { -((lane / 2) as i32) };
        assert_eq!(out[lane], expected);
    }
}

fn run_all<B: Backend<Elem = i32>>() {
    masked_store_respects_guards::<B>();
    masked_load_zero_fills::<B>();
    arithmetic_wraps::<B>();
    masked_arithmetic_merges_first_operand::<B>();
    gather_scatter_round_trip::<B>();
    scatter_collision_highest_lane_wins::<B>();
    permute_reverses::<B>();
}

#[test_log::test]
fn test_scalar_backend() {
    run_all::<Scalar<i32>>();
}

#[test_log::test]
fn test_portable_i32_backend() {
    run_all::<PortableI32>();
}

#[test_log::test]
fn test_native_i32_backend() {
    run_all::<NativeI32>();
}

#[test_log::test]
fn test_scalar_empty_mask_touches_nothing() {
    let mut dst = [7i64];
    Scalar::<i64>::store_masked(ScalarReg(1), &mut dst, LaneMask::empty(1));
    assert_eq!(dst, [7]);
    let reg = Scalar::<i64>::load_masked(&[], LaneMask::empty(1));
    assert_eq!(reg, ScalarReg(0));
}

#[test_log::test]
fn test_f32_backends_agree_with_scalar_rounding() {
    let a: Vec<f32> = (0..16).map(|i| 0.1 + i as f32 * 0.37).collect();
    let b: Vec<f32> = (0..16).map(|i| 1.3 - i as f32 * 0.11).collect();
    for (name, sum, product) in [
        (
            PortableF32::NAME,
            PortableF32::to_vec(PortableF32::add(PortableF32::load(&a), PortableF32::load(&b))),
            PortableF32::to_vec(PortableF32::mul(PortableF32::load(&a), PortableF32::load(&b))),
        ),
        (
            NativeF32::NAME,
            NativeF32::to_vec(NativeF32::add(NativeF32::load(&a), NativeF32::load(&b))),
            NativeF32::to_vec(NativeF32::mul(NativeF32::load(&a), NativeF32::load(&b))),
        ),
    ] {
        for i in 0..16 {
            assert_eq!(sum[i].to_bits(), (a[i] + b[i]).to_bits(), "{} add lane {}", name, i);
            assert_eq!(product[i].to_bits(), (a[i] * b[i]).to_bits(), "{} mul lane {}", name, i);
        }
    }
}

#[test_log::test]
fn test_i64_backends_mask_eight_lanes() {
    let src: Vec<i64> = (1..=18).collect();
    let tail = LaneMask::tail(2, 8).unwrap();
    for (name, lanes) in [
        (
            PortableI64::NAME,
            PortableI64::to_vec(PortableI64::load_masked(&src[16..], tail)),
        ),
        (
            NativeI64::NAME,
            NativeI64::to_vec(NativeI64::load_masked(&src[16..], tail)),
        ),
    ] {
        assert_eq!(lanes, vec![17, 18, 0, 0, 0, 0, 0, 0], "{}", name);
    }
}

#[test]
#[should_panic(expected = "masked access past the end")]
fn test_masked_store_past_slice_panics() {
    let mut dst = [0i32; 4];
    PortableI32::store_masked(PortableI32::splat(1), &mut dst, LaneMask::tail(5, 16).unwrap());
}
