//! Hierarchical exclusive prefix sum
//!
//! Three dispatches over a bucket array whose length is a multiple of
//! [`BLOCK_SIZE`]:
//!
//! 1. every block is scanned in block-local memory (Blelloch up-sweep then
//!    down-sweep) and its total lands in `block_sums[block]`;
//! 2. `block_sums` is scanned by the same kernel as a single block, and its
//!    total is the grand total;
//! 3. every block but the first adds its scanned block sum back.
//!
//! Two levels cap the array at `BLOCK_SIZE²` elements.

use crate::device::{
    dispatch_chunks_mut, dispatch_chunks_with, round_up_to_block, DispatchMode, BLOCK_SIZE,
    MAX_BUCKETS,
};
use crate::error::SetupError;
use std::ops::Add;
use tracing::trace;

/// Element type the scan can sum. `Default` is the identity.
pub trait ScanValue: Copy + Default + Send + Sync + Add<Output = Self> {}

impl ScanValue for u32 {}

/// Exclusive Blelloch scan of one block in place. Returns the block total.
///
/// Each pass of the outer loops is one barrier interval; the inner loop is
/// the active lanes of that interval.
pub fn scan_block<V: ScanValue>(shared: &mut [V; BLOCK_SIZE]) -> V {
    let mut offset = 1;

    // Up-sweep: build a reduction tree in place.
    let mut active = BLOCK_SIZE >> 1;
    while active > 0 {
        for lane in 0..active {
            let ai = offset * (2 * lane + 1) - 1;
            let bi = offset * (2 * lane + 2) - 1;
            shared[bi] = shared[bi] + shared[ai];
        }
        offset <<= 1;
        active >>= 1;
    }

    let total = shared[BLOCK_SIZE - 1];
    shared[BLOCK_SIZE - 1] = V::default();

    // Down-sweep: push partial sums back down the tree.
    let mut active = 1;
    while active < BLOCK_SIZE {
        offset >>= 1;
        for lane in 0..active {
            let ai = offset * (2 * lane + 1) - 1;
            let bi = offset * (2 * lane + 2) - 1;
            let left = shared[ai];
            shared[ai] = shared[bi];
            shared[bi] = shared[bi] + left;
        }
        active <<= 1;
    }

    total
}

/// Load a global chunk into block-local memory, scan it, store it back.
fn scan_chunk<V: ScanValue>(chunk: &mut [V]) -> V {
    let mut shared = [V::default(); BLOCK_SIZE];
    shared.copy_from_slice(chunk);
    let total = scan_block(&mut shared);
    chunk.copy_from_slice(&shared);
    total
}

/// Two-level scan with its block-sums array allocated once at setup.
#[derive(Debug)]
pub struct HierarchicalScan<V: ScanValue> {
    capacity: usize,
    block_sums: Box<[V]>,
    total: V,
    mode: DispatchMode,
}

impl<V: ScanValue> HierarchicalScan<V> {
    /// Scan for arrays of `capacity` elements, rounded up to whole blocks.
    pub fn new(capacity: usize, mode: DispatchMode) -> Result<Self, SetupError> {
        let capacity = round_up_to_block(capacity);
        if capacity > MAX_BUCKETS {
            return Err(SetupError::TooManyBuckets {
                requested: capacity as u128,
                max: MAX_BUCKETS,
            });
        }
        Ok(Self {
            capacity,
            block_sums: vec![V::default(); BLOCK_SIZE].into_boxed_slice(),
            total: V::default(),
            mode,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.capacity / BLOCK_SIZE
    }

    /// Scanned block sums of the last run. Entries past the block count hold
    /// the exclusive prefix of every block, which is the grand total.
    #[inline]
    pub fn block_sums(&self) -> &[V] {
        &self.block_sums
    }

    /// Grand total of the last run.
    #[inline]
    pub fn total(&self) -> V {
        self.total
    }

    /// Replace `values` with their exclusive prefix sum and return the total.
    ///
    /// # Panics
    ///
    /// If `values.len()` differs from [`HierarchicalScan::capacity`].
    pub fn run(&mut self, values: &mut [V]) -> V {
        assert_eq!(
            values.len(),
            self.capacity,
            "scan input must match the capacity allocated at setup"
        );
        let blocks = self.block_count();

        self.block_sums.fill(V::default());
        dispatch_chunks_with(self.mode, values, BLOCK_SIZE, &mut self.block_sums, |_, chunk, sum| {
            *sum = scan_chunk(chunk);
        });
        trace!(blocks, "scan blocks");

        let mut total = V::default();
        dispatch_chunks_with(
            self.mode,
            &mut self.block_sums,
            BLOCK_SIZE,
            std::slice::from_mut(&mut total),
            |_, chunk, sum| *sum = scan_chunk(chunk),
        );
        self.total = total;
        trace!("scan block sums");

        if blocks > 1 {
            let sums = &self.block_sums;
            dispatch_chunks_mut(self.mode, &mut values[BLOCK_SIZE..], BLOCK_SIZE, |block, chunk| {
                let base = sums[block + 1];
                for value in chunk.iter_mut() {
                    *value = *value + base;
                }
            });
            trace!(blocks = blocks - 1, "add block sums");
        }

        total
    }
}
