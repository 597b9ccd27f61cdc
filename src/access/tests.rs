// src/access/tests.rs

use super::{gather, scatter, IndexPolicy, IndexSet};
use crate::backend::portable::PortableI32;
use crate::backend::Backend;
use crate::error::EngineError;
use crate::mask::LaneMask;
use std::borrow::Cow;

/// Lane order of the reference walk: 69, 31, 18, ... , 1.
const WALK: [usize; 16] = [69, 31, 18, 3, 11, 6, 2, 73, 53, 35, 40, 20, 7, 10, 5, 1];

#[test_log::test]
fn test_gather_reads_offsets_in_lane_order() {
    let data: Vec<i32> = (0..128).map(|i| i + 1).collect();
    let indices = IndexSet::from_slice(&WALK, 16).unwrap();
    let reg = gather::<PortableI32>(&data, &indices, None, IndexPolicy::Reject).unwrap();
    let expected: Vec<i32> = WALK.iter().map(|&i| i as i32 + 1).collect();
    assert_eq!(PortableI32::to_vec(reg), expected);
}

#[test_log::test]
fn test_out_of_bounds_active_lane_rejects_whole_scatter() {
    let mut data = vec![0i32; 32];
    let mut offsets = vec![0usize; 16];
    offsets[9] = 32;
    let indices = IndexSet::new(offsets, 16).unwrap();

    let err = scatter::<PortableI32>(
        &mut data,
        &indices,
        PortableI32::splat(9),
        None,
        IndexPolicy::Reject,
    )
    .unwrap_err();
    assert_eq!(
        err,
        EngineError::IndexOutOfBounds {
            lane: 9,
            index: 32,
            capacity: 32
        }
    );
    assert!(data.iter().all(|&v| v == 0), "partial scatter observed");
}

#[test_log::test]
fn test_inactive_lanes_skip_bounds_check() {
    let data = vec![5i32; 4];
    let mut offsets: Vec<usize> = (0..16).collect();
    offsets[15] = usize::MAX;
    let indices = IndexSet::new(offsets, 16).unwrap();
    let mask = LaneMask::tail(4, 16).unwrap();
    let reg = gather::<PortableI32>(&data, &indices, Some(mask), IndexPolicy::Reject).unwrap();
    let lanes = PortableI32::to_vec(reg);
    assert_eq!(&lanes[..4], &[5, 5, 5, 5]);
    assert!(lanes[4..].iter().all(|&v| v == 0));
}

#[test_log::test]
fn test_clamp_policy_pins_to_last_element() {
    let indices = IndexSet::from_slice(&[0, 2, 9, 40], 4).unwrap();
    let full = LaneMask::full(4);
    let resolved = indices.resolve(4, full, IndexPolicy::Clamp).unwrap();
    assert_eq!(resolved.as_slice(), &[0, 2, 3, 3]);

    // Already in range: nothing to copy.
    let in_range = IndexSet::from_slice(&[0, 1, 2, 3], 4).unwrap();
    assert!(matches!(
        in_range.resolve(4, full, IndexPolicy::Clamp).unwrap(),
        Cow::Borrowed(_)
    ));

    // Empty buffer has no element to clamp to.
    assert!(indices.resolve(0, full, IndexPolicy::Clamp).is_err());
}

#[test_log::test]
fn test_duplicates_and_highest_lane_wins() {
    let mut offsets: Vec<usize> = (0..16).collect();
    offsets[2] = 7;
    offsets[11] = 7;
    let indices = IndexSet::new(offsets, 16).unwrap();
    assert_eq!(indices.duplicates(LaneMask::full(16)), vec![7]);

    let mut data = vec![0i32; 16];
    let reg = PortableI32::from_fn(|lane| lane as i32 * 100);
    scatter::<PortableI32>(&mut data, &indices, reg, None, IndexPolicy::Reject).unwrap();
    assert_eq!(data[7], 1100);

    // Drop lane 11 from the mask: lane 7 is now the last writer.
    let mask = !LaneMask::from_bits(1 << 11, 16);
    let mut data = vec![0i32; 16];
    scatter::<PortableI32>(&mut data, &indices, reg, Some(mask), IndexPolicy::Reject).unwrap();
    assert_eq!(data[7], 700);
}

#[test_log::test]
fn test_index_set_width_checked() {
    assert_eq!(
        IndexSet::new(vec![0; 3], 4),
        Err(EngineError::LaneCountMismatch {
            expected: 4,
            actual: 3
        })
    );
    let narrow = IndexSet::strided(0, 1, 8);
    assert!(gather::<PortableI32>(&[0; 16], &narrow, None, IndexPolicy::Reject).is_err());
    assert_eq!(format!("{:?}", narrow), "IndexSet([0, 1, 2, 3, 4, 5, 6, 7])");
}

#[test_log::test]
fn test_strided_offsets_saturate_instead_of_overflowing() {
    let indices = IndexSet::strided(usize::MAX - 4, 1, 16);
    assert_eq!(&indices.as_slice()[..4], &[usize::MAX - 4, usize::MAX - 3, usize::MAX - 2, usize::MAX - 1]);
    assert!(indices.as_slice()[4..].iter().all(|&o| o == usize::MAX));

    let wide = IndexSet::strided(1, usize::MAX, 16);
    assert_eq!(wide.get(0), 1);
    assert!(wide.as_slice()[1..].iter().all(|&o| o == usize::MAX));

    let mut data = vec![0i32; 8];
    assert_eq!(
        gather::<PortableI32>(&data, &indices, None, IndexPolicy::Reject).unwrap_err(),
        EngineError::IndexOutOfBounds {
            lane: 0,
            index: usize::MAX - 4,
            capacity: 8
        }
    );
    assert!(scatter::<PortableI32>(
        &mut data,
        &wide,
        PortableI32::splat(3),
        None,
        IndexPolicy::Reject
    )
    .is_err());
    assert!(data.iter().all(|&v| v == 0));

    // Clamping sends every lane to the last element; lane 15 lands last.
    scatter::<PortableI32>(
        &mut data,
        &indices,
        PortableI32::from_fn(|lane| lane as i32),
        None,
        IndexPolicy::Clamp,
    )
    .unwrap();
    assert_eq!(data, vec![0, 0, 0, 0, 0, 0, 0, 15]);
}
