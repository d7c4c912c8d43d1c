//! Bucket counter
//!
//! `clear` zeroes a per-bucket array; `count` bumps one atomic counter per
//! item and records the value it saw, which becomes the item's rank inside
//! its bucket.

use crate::device::{atomic_view, dispatch_chunks_mut, DispatchMode, LANES_PER_BLOCK};
use crate::grid::GridLayout;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::sync::atomic::{AtomicU32, Ordering};

/// Anything with a position the grid can bucket.
pub trait SpatialItem: Copy + Send + Sync {
    fn position(&self) -> Vec3;
}

impl SpatialItem for Vec3 {
    #[inline]
    fn position(&self) -> Vec3 {
        *self
    }
}

/// Per-item result of the count kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct GridEntry {
    /// Bucket key of the item.
    pub key: u32,
    /// Counter value before this item's increment.
    pub rank: u32,
}

/// Zero every element. One lane per element, so a bucket array of `M`
/// clears in `M / 512` blocks.
pub fn clear<V>(mode: DispatchMode, values: &mut [V])
where
    V: Copy + Default + Send + Sync,
{
    dispatch_chunks_mut(mode, values, LANES_PER_BLOCK, |_, chunk| chunk.fill(V::default()));
}

/// Count `items` into `counters` and fill `entries` (one per item).
///
/// Returns how many items fell outside the grid and were clamped.
pub fn count<T: SpatialItem>(
    mode: DispatchMode,
    grid: &GridLayout,
    items: &[T],
    counters: &mut [u32],
    entries: &mut [GridEntry],
) -> u32 {
    debug_assert_eq!(items.len(), entries.len());
    let counters = atomic_view(counters);
    let clamped = AtomicU32::new(0);

    dispatch_chunks_mut(mode, entries, LANES_PER_BLOCK, |block, out| {
        let base = block * LANES_PER_BLOCK;
        let mut block_clamped = 0;
        for (lane, entry) in out.iter_mut().enumerate() {
            let (cell, was_clamped) = grid.cell_of(items[base + lane].position());
            let key = grid.key(cell);
            let rank = counters[key as usize].fetch_add(1, Ordering::Relaxed);
            *entry = GridEntry { key, rank };
            block_clamped += u32::from(was_clamped);
        }
        if block_clamped > 0 {
            clamped.fetch_add(block_clamped, Ordering::Relaxed);
        }
    });

    clamped.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;

    #[test]
    fn test_counts_sum_to_item_count() {
        let grid = GridLayout::new(UVec3::new(4, 1, 1), 1.0, Vec3::ZERO).unwrap();
        let items: Vec<Vec3> = (0..1500)
            .map(|i| Vec3::new((i % 4) as f32 + 0.5, 0.5, 0.5))
            .collect();
        let mut counters = vec![7u32; grid.bucket_capacity()];
        let mut entries = vec![GridEntry::default(); items.len()];

        clear(DispatchMode::Parallel, &mut counters);
        assert!(counters.iter().all(|&c| c == 0));

        let clamped = count(DispatchMode::Parallel, &grid, &items, &mut counters, &mut entries);
        assert_eq!(clamped, 0);
        assert_eq!(counters.iter().sum::<u32>(), 1500);
        assert_eq!(&counters[..4], &[375, 375, 375, 375]);
    }

    #[test]
    fn test_ranks_are_unique_per_bucket() {
        let grid = GridLayout::new(UVec3::new(3, 1, 1), 1.0, Vec3::ZERO).unwrap();
        let items: Vec<Vec3> = (0..2000).map(|i| Vec3::new((i % 3) as f32, 0.0, 0.0)).collect();
        let mut counters = vec![0u32; grid.bucket_capacity()];
        let mut entries = vec![GridEntry::default(); items.len()];
        count(DispatchMode::Parallel, &grid, &items, &mut counters, &mut entries);

        for key in 0..3 {
            let mut ranks: Vec<u32> = entries
                .iter()
                .filter(|e| e.key == key)
                .map(|e| e.rank)
                .collect();
            ranks.sort_unstable();
            assert_eq!(ranks, (0..counters[key as usize]).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_sequential_ranks_follow_source_order() {
        let grid = GridLayout::new(UVec3::new(3, 1, 1), 1.0, Vec3::ZERO).unwrap();
        let items = [2.0, 0.0, 2.0, 1.0, 0.0].map(|x| Vec3::new(x, 0.0, 0.0));
        let mut counters = vec![0u32; grid.bucket_capacity()];
        let mut entries = vec![GridEntry::default(); items.len()];
        count(DispatchMode::Sequential, &grid, &items, &mut counters, &mut entries);

        let ranks: Vec<(u32, u32)> = entries.iter().map(|e| (e.key, e.rank)).collect();
        assert_eq!(ranks, vec![(2, 0), (0, 0), (2, 1), (1, 0), (0, 1)]);
        assert_eq!(&counters[..3], &[2, 1, 2]);
    }

    #[test]
    fn test_reports_clamped_items() {
        let grid = GridLayout::new(UVec3::new(2, 2, 2), 1.0, Vec3::ZERO).unwrap();
        let items = [Vec3::splat(0.5), Vec3::splat(-3.0), Vec3::splat(9.0)];
        let mut counters = vec![0u32; grid.bucket_capacity()];
        let mut entries = vec![GridEntry::default(); items.len()];
        let clamped = count(DispatchMode::Parallel, &grid, &items, &mut counters, &mut entries);
        assert_eq!(clamped, 2);
        assert_eq!(entries[1].key, 0);
        assert_eq!(entries[2].key, 7);
    }
}
