//! Property-based tests for the spatial counting sort using proptest
//!
//! These tests verify the pass invariants across random item sets:
//! - Counts sum to the item count and the scan total matches
//! - Offsets never decrease
//! - Every span holds only its own bucket, and the output is a permutation
//! - Sequential passes keep source order inside a bucket
//! - Sorting sorted output changes nothing

use gridsort_core::counter::{self, GridEntry};
use gridsort_core::glam::{UVec3, Vec3};
use gridsort_core::scan::HierarchicalScan;
use gridsort_core::{DispatchMode, GridLayout, SpatialItem, SpatialSorter, BLOCK_SIZE};
use proptest::prelude::*;

// 20 × 20 × 6 = 2400 cells, so passes span three scan blocks.
const DIMS: UVec3 = UVec3::new(20, 20, 6);
const CELL_SIZE: f32 = 0.5;
const MAX_ITEMS: usize = 3000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tagged {
    position: Vec3,
    id: u32,
}

impl SpatialItem for Tagged {
    fn position(&self) -> Vec3 {
        self.position
    }
}

fn grid() -> GridLayout {
    GridLayout::new(DIMS, CELL_SIZE, Vec3::ZERO).unwrap()
}

/// Positions inside the grid plus a margin outside it, to exercise clamping.
fn position() -> impl Strategy<Value = Vec3> {
    let extent = DIMS.as_vec3() * CELL_SIZE;
    (-1.0f32..extent.x + 1.0, -1.0f32..extent.y + 1.0, -1.0f32..extent.z + 1.0)
        .prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn item_set() -> impl Strategy<Value = Vec<Tagged>> {
    prop::collection::vec(position(), 0..MAX_ITEMS).prop_map(|positions| {
        positions
            .into_iter()
            .enumerate()
            .map(|(id, position)| Tagged { position, id: id as u32 })
            .collect()
    })
}

fn mode() -> impl Strategy<Value = DispatchMode> {
    prop_oneof![Just(DispatchMode::Parallel), Just(DispatchMode::Sequential)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_counts_sum_to_item_count(items in item_set(), mode in mode()) {
        let grid = grid();
        let mut counters = vec![0u32; grid.bucket_capacity()];
        let mut entries = vec![GridEntry::default(); items.len()];
        counter::count(mode, &grid, &items, &mut counters, &mut entries);

        prop_assert_eq!(counters.iter().map(|&c| c as usize).sum::<usize>(), items.len());
        for (item, entry) in items.iter().zip(&entries) {
            prop_assert_eq!(entry.key, grid.key_of(item.position));
            prop_assert!(entry.rank < counters[entry.key as usize]);
        }
    }

    #[test]
    fn test_spans_partition_the_output(items in item_set(), mode in mode()) {
        let grid = grid();
        let mut sorter = SpatialSorter::new(grid, MAX_ITEMS, mode).unwrap();
        let mut output = vec![Tagged { position: Vec3::ZERO, id: u32::MAX }; items.len()];
        let spans = sorter.sort(&items, &mut output).unwrap();

        prop_assert_eq!(spans.total() as usize, items.len());
        prop_assert!(spans.offsets().windows(2).all(|w| w[0] <= w[1]));

        for key in 0..grid.cell_count() as u32 {
            for item in &output[spans.span(key)] {
                prop_assert_eq!(grid.key_of(item.position), key);
            }
        }

        let mut ids: Vec<u32> = output.iter().map(|item| item.id).collect();
        ids.sort_unstable();
        prop_assert!(ids.iter().enumerate().all(|(i, &id)| id == i as u32));
    }

    #[test]
    fn test_sequential_pass_is_stable(items in item_set()) {
        let grid = grid();
        let mut sorter = SpatialSorter::new(grid, MAX_ITEMS, DispatchMode::Sequential).unwrap();
        let mut output = items.clone();
        let spans = sorter.sort(&items, &mut output).unwrap();

        for key in 0..grid.cell_count() as u32 {
            let span = &output[spans.span(key)];
            prop_assert!(span.windows(2).all(|w| w[0].id < w[1].id));
        }
    }

    #[test]
    fn test_sorting_sorted_output_is_identity(items in item_set()) {
        let mut sorter = SpatialSorter::new(grid(), MAX_ITEMS, DispatchMode::Sequential).unwrap();
        let mut once = items.clone();
        sorter.sort(&items, &mut once).unwrap();
        let mut twice = items.clone();
        sorter.sort(&once, &mut twice).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_scan_matches_serial_prefix_sum(
        blocks in 1usize..=4,
        seed in prop::collection::vec(0u32..64, 1..=64),
        mode in mode(),
    ) {
        let mut scan = HierarchicalScan::<u32>::new(blocks * BLOCK_SIZE, mode).unwrap();
        let input: Vec<u32> = (0..scan.capacity()).map(|i| seed[i % seed.len()]).collect();
        let mut values = input.clone();
        let total = scan.run(&mut values);

        let mut running = 0u32;
        for (value, original) in values.iter().zip(&input) {
            prop_assert_eq!(*value, running);
            running += original;
        }
        prop_assert_eq!(total, running);
    }
}

#[test]
fn test_reference_keys() {
    // Keys [2, 0, 2, 1, 0] → counts [2, 1, 2] → offsets [0, 2, 3] → keys [0, 0, 1, 2, 2].
    let grid = GridLayout::new(UVec3::new(3, 1, 1), 1.0, Vec3::ZERO).unwrap();
    let items: Vec<Tagged> = [2.5, 0.5, 2.5, 1.5, 0.5]
        .iter()
        .enumerate()
        .map(|(id, &x)| Tagged { position: Vec3::new(x, 0.5, 0.5), id: id as u32 })
        .collect();
    let mut sorter = SpatialSorter::new(grid, items.len(), DispatchMode::Sequential).unwrap();
    let mut output = items.clone();
    let spans = sorter.sort(&items, &mut output).unwrap();

    assert_eq!(&spans.offsets()[..3], &[0, 2, 3]);
    assert_eq!(spans.total(), 5);
    let ids: Vec<u32> = output.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![1, 4, 3, 0, 2]);
}

#[test]
fn test_all_items_in_one_bucket() {
    let grid = grid();
    let items: Vec<Tagged> = (0..2500)
        .map(|id| Tagged { position: Vec3::splat(0.1), id })
        .collect();
    let mut sorter = SpatialSorter::new(grid, items.len(), DispatchMode::Sequential).unwrap();
    let mut output = items.clone();
    let spans = sorter.sort(&items, &mut output).unwrap();

    assert_eq!(spans.offsets()[0], 0);
    assert!(spans.offsets()[1..].iter().all(|&o| o == 2500));
    let cell_offsets: Vec<u32> = spans.cell_offsets().collect();
    assert_eq!(cell_offsets.len(), spans.bucket_count() + 1);
    assert!(cell_offsets[1..].iter().all(|&o| o == 2500));
    assert_eq!(spans.total(), 2500);
    assert_eq!(output, items);
}
