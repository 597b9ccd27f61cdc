// src/engine/tests.rs

use super::Engine;
use crate::access::{IndexPolicy, IndexSet};
use crate::backend::portable::{PortableF32, PortableI32, PortableI64};
use crate::backend::scalar::Scalar;
use crate::backend::Backend;
use crate::buffer::AlignedBuffer;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::kernel::{BinaryOp, Op};
use crate::layout::{RecordShape, RecordTransposer};
use crate::mask::LaneMask;

#[test_log::test]
fn test_eighteen_element_add_with_tail() {
    let engine = Engine::<PortableI64>::with_defaults();
    let a = AlignedBuffer::from_fn(18, |i| i as i64 + 1);
    let b = AlignedBuffer::from_fn(18, |i| (i as i64 + 1) * 10);
    // Two spare elements past the logical end, filled with a sentinel.
    let mut c = AlignedBuffer::from_fn(20, |_| -1i64);

    let plan: Vec<_> = engine.plan(18).unwrap().map(|c| (c.start, c.len)).collect();
    assert_eq!(plan, vec![(0, 8), (8, 8), (16, 2)]);
    assert_eq!(engine.tail_mask(2).unwrap().bits(), 0b0000_0011);

    engine.zip_with(&Op::Add, &a, &b, &mut c[..18]).unwrap();
    for i in 0..18 {
        assert_eq!(c[i], (i as i64 + 1) * 11);
    }
    assert_eq!(&c[18..], &[-1, -1]);
}

#[test_log::test]
fn test_aligned_load_store_partial_register() {
    let engine = Engine::<PortableF32>::with_defaults();
    let mut buffer = AlignedBuffer::from_fn(32, |i| i as f32);

    let reg = engine.load(&buffer, 16, 5, None).unwrap();
    let lanes = PortableF32::to_vec(reg);
    assert_eq!(&lanes[..5], &[16.0, 17.0, 18.0, 19.0, 20.0]);
    assert!(lanes[5..].iter().all(|&v| v == 0.0));

    engine.store(&mut buffer, 0, PortableF32::splat(-1.0), 3, None).unwrap();
    assert_eq!(&buffer[..4], &[-1.0, -1.0, -1.0, 3.0]);
}

#[test_log::test]
fn test_strict_alignment_rejects_offset_start() {
    let engine = Engine::<PortableI32>::with_defaults();
    let mut buffer = AlignedBuffer::<i32>::zeroed(64);
    let err = engine.load(&buffer, 3, 16, None).unwrap_err();
    assert_eq!(
        err,
        EngineError::Misaligned {
            address: buffer.address_of(3),
            required: 64
        }
    );
    assert!(engine
        .store(&mut buffer, 1, PortableI32::splat(9), 16, None)
        .is_err());
    assert!(buffer.iter().all(|&v| v == 0));
}

#[test_log::test]
fn test_misaligned_start_fails_under_every_config() {
    let buffer = AlignedBuffer::from_fn(64, |i| i as i32);
    let mut clamp = EngineConfig::default();
    clamp.access.index_policy = IndexPolicy::Clamp;
    clamp.logging.trace_chunks = true;

    for config in [EngineConfig::default(), clamp] {
        let engine = Engine::<PortableI32>::new(config);
        for offset in 1..16 {
            assert_eq!(
                engine.load(&buffer, offset, 16, None).unwrap_err(),
                EngineError::Misaligned {
                    address: buffer.address_of(offset),
                    required: 64
                },
                "offset {}",
                offset
            );
        }
        // Arbitrary offsets go through the unaligned variants.
        let reg = engine.load_unaligned(&buffer, 3, 16, None).unwrap();
        assert_eq!(PortableI32::to_vec(reg), (3..19).collect::<Vec<_>>());
    }
}

#[test_log::test]
fn test_scalar_backend_is_always_aligned() {
    let engine = Engine::<Scalar<i32>>::with_defaults();
    let buffer = AlignedBuffer::from_fn(7, |i| i as i32);
    for offset in 0..7 {
        let reg = engine.load(&buffer, offset, 1, None).unwrap();
        assert_eq!(reg.0, offset as i32);
    }
}

#[test_log::test]
fn test_load_store_reject_bad_spans() {
    let engine = Engine::<PortableI32>::with_defaults();
    let mut buffer = AlignedBuffer::<i32>::zeroed(20);

    assert_eq!(
        engine.load(&buffer, 16, 16, None).unwrap_err(),
        EngineError::RangeOutOfBounds {
            offset: 16,
            len: 16,
            capacity: 20
        }
    );
    assert_eq!(
        engine.load(&buffer, 0, 17, None).unwrap_err(),
        EngineError::LengthExceedsLanes { len: 17, lanes: 16 }
    );
    let wide = LaneMask::tail(9, 16).unwrap();
    assert_eq!(
        engine
            .store(&mut buffer, 0, PortableI32::splat(1), 4, Some(wide))
            .unwrap_err(),
        EngineError::MaskExceedsLength { len: 4 }
    );
    assert!(buffer.iter().all(|&v| v == 0));
}

#[test_log::test]
fn test_zero_length_access_touches_nothing() {
    let engine = Engine::<PortableI32>::with_defaults();
    let mut buffer = AlignedBuffer::from_fn(16, |_| 7i32);
    let reg = engine.load(&buffer, 16, 0, None).unwrap();
    assert_eq!(PortableI32::to_vec(reg), vec![0; 16]);
    engine
        .store(&mut buffer, 0, PortableI32::splat(1), 0, None)
        .unwrap();
    engine
        .store(&mut buffer, 16, PortableI32::splat(1), 0, Some(LaneMask::empty(16)))
        .unwrap();
    assert!(buffer.iter().all(|&v| v == 7));

    let mut words = vec![5i32; 3];
    let reg = engine.load_unaligned(&words, 3, 0, None).unwrap();
    assert_eq!(PortableI32::to_vec(reg), vec![0; 16]);
    engine
        .store_unaligned(&mut words, 3, PortableI32::splat(1), 0, None)
        .unwrap();
    assert_eq!(words, vec![5, 5, 5]);

    // Bounds and alignment still apply to an empty span.
    assert!(engine.load(&buffer, 17, 0, None).is_err());
    assert!(engine.load(&buffer, 1, 0, None).is_err());
}

#[test_log::test]
fn test_supplied_mask_selects_lanes() {
    let engine = Engine::<PortableI32>::with_defaults();
    let mut buffer = AlignedBuffer::<i32>::zeroed(16);
    let odd = LaneMask::from_lanes((0..16).map(|i| i % 2 == 1));
    engine
        .store(&mut buffer, 0, PortableI32::splat(4), 16, Some(odd))
        .unwrap();
    for (i, &v) in buffer.iter().enumerate() {
        assert_eq!(v, if i % 2 == 1 { 4 } else { 0 });
    }
}

#[test_log::test]
fn test_unaligned_variants_work_on_any_slice() {
    let engine = Engine::<PortableI32>::with_defaults();
    let src: Vec<i32> = (0..40).collect();
    let reg = engine.load_unaligned(&src, 3, 16, None).unwrap();
    assert_eq!(PortableI32::lane(reg, 0), 3);
    let mut dst = vec![0; 40];
    engine.store_unaligned(&mut dst, 37, reg, 3, None).unwrap();
    assert_eq!(&dst[37..], &[3, 4, 5]);
    assert!(dst[..37].iter().all(|&v| v == 0));
}

#[test_log::test]
fn test_map_scalar_and_update() {
    let engine = Engine::<PortableI32>::with_defaults();
    let a: Vec<i32> = (0..37).collect();
    let mut out = vec![0; 37];
    engine.map_scalar(&Op::Multiply, &a, 3, &mut out).unwrap();
    assert_eq!(out, a.iter().map(|x| x * 3).collect::<Vec<_>>());

    engine.update(&Op::Add, &mut out, &a).unwrap();
    assert_eq!(out, a.iter().map(|x| x * 4).collect::<Vec<_>>());
}

#[test_log::test]
fn test_traversals_check_lengths_first() {
    let engine = Engine::<PortableI32>::with_defaults();
    let mut out = vec![0; 10];
    assert_eq!(
        engine.zip_with(&Op::Add, &[1; 10], &[1; 9], &mut out),
        Err(EngineError::BufferLengthMismatch {
            expected: 10,
            actual: 9
        })
    );
    assert!(out.iter().all(|&v| v == 0));
}

#[test_log::test]
fn test_gather_apply_scatter_walk() {
    let engine = Engine::<PortableI32>::with_defaults();
    let mut data: Vec<i32> = (0..128).map(|i| i + 1).collect();
    let walk = [69, 31, 18, 3, 11, 6, 2, 73, 53, 35, 40, 20, 7, 10, 5, 1];
    let indices = IndexSet::from_slice(&walk, 16).unwrap();

    engine
        .gather_apply_scatter(&mut data, &indices, &Op::Add, 100, None)
        .unwrap();

    for (i, &value) in data.iter().enumerate() {
        let expected = i as i32 + 1 + if walk.contains(&i) { 100 } else { 0 };
        assert_eq!(value, expected, "offset {}", i);
    }
}

#[test_log::test]
fn test_clamp_policy_from_config() {
    let mut config = EngineConfig::default();
    config.access.index_policy = IndexPolicy::Clamp;
    let engine = Engine::<PortableI32>::new(config);
    let data: Vec<i32> = (0..10).collect();
    let indices = IndexSet::strided(0, 3, 16);
    let reg = engine.gather(&data, &indices, None).unwrap();
    let lanes = PortableI32::to_vec(reg);
    assert_eq!(&lanes[..4], &[0, 3, 6, 9]);
    assert!(lanes[4..].iter().all(|&v| v == 9));

    let strict = Engine::<PortableI32>::with_defaults();
    assert!(strict.gather(&data, &indices, None).is_err());
}

#[test_log::test]
fn test_transform_records_with_dead_lane() {
    // 3-field points: 5 per register, lane 15 never stored.
    let engine = Engine::<PortableF32>::with_defaults();
    let transposer = RecordTransposer::new(RecordShape::new(3, 16).unwrap());
    let records = 13;
    let mut points: Vec<f32> = (0..records * 3).map(|i| i as f32).collect();
    let original = points.clone();

    engine
        .transform_records(&mut points, &transposer, &[1.0, 2.0, 3.0], BinaryOp::Add)
        .unwrap();

    for (i, (&after, &before)) in points.iter().zip(&original).enumerate() {
        assert_eq!(after, before + (i % 3 + 1) as f32, "element {}", i);
    }
}

#[test_log::test]
fn test_transform_records_rejects_partial_record() {
    let engine = Engine::<PortableI32>::with_defaults();
    let transposer = RecordTransposer::new(RecordShape::new(4, 16).unwrap());
    let mut data = vec![1; 10];
    assert_eq!(
        engine.transform_records(&mut data, &transposer, &[1, 1, 1, 1], BinaryOp::Add),
        Err(EngineError::PartialRecord { len: 10, fields: 4 })
    );
    assert!(data.iter().all(|&v| v == 1));
}

#[test_log::test]
fn test_deinterleave_interleave_round_trip() {
    let engine = Engine::<PortableI32>::with_defaults();
    let transposer = RecordTransposer::new(RecordShape::new(3, 16).unwrap());
    let records = 21;
    let aos: Vec<i32> = (0..records as i32 * 3).collect();

    let mut xs = vec![0; records];
    let mut ys = vec![0; records];
    let mut zs = vec![0; records];
    engine
        .deinterleave(&transposer, &aos, &mut [xs.as_mut_slice(), ys.as_mut_slice(), zs.as_mut_slice()])
        .unwrap();
    for r in 0..records {
        assert_eq!((xs[r], ys[r], zs[r]), (3 * r as i32, 3 * r as i32 + 1, 3 * r as i32 + 2));
    }

    let mut back = vec![-1; records * 3];
    engine
        .interleave(&transposer, &[xs.as_slice(), ys.as_slice(), zs.as_slice()], &mut back)
        .unwrap();
    assert_eq!(back, aos);
}

#[test_log::test]
fn test_deinterleave_needs_one_output_per_field() {
    let engine = Engine::<PortableI32>::with_defaults();
    let transposer = RecordTransposer::new(RecordShape::new(2, 16).unwrap());
    let mut xs = vec![0; 4];
    assert_eq!(
        engine.deinterleave(&transposer, &[0; 8], &mut [xs.as_mut_slice()]),
        Err(EngineError::SourceCountMismatch {
            expected: 2,
            actual: 1
        })
    );
}
