//! Block-structured reference device
//!
//! Every kernel in this crate is written the way it runs on a GPU: a grid of
//! fixed-size blocks, each block a set of lanes that loop in lockstep. On the
//! CPU a block is one rayon task, a lane loop is a plain `for`, and the end of
//! each lane loop stands in for the block barrier. Dispatch boundaries are
//! full synchronisation points because `for_each` joins before returning.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::atomic::AtomicU32;

/// Elements scanned by one block. Bucket capacity is always a multiple of this.
pub const BLOCK_SIZE: usize = 1024;

/// Lanes per block. Each lane owns two elements during the scan, and item
/// kernels (count, scatter, steering) process this many items per block.
pub const LANES_PER_BLOCK: usize = BLOCK_SIZE / 2;

/// The block-sums array is itself scanned as a single block.
pub const MAX_SCAN_BLOCKS: usize = BLOCK_SIZE;

/// Two-level hierarchy ceiling: `BLOCK_SIZE²` buckets.
pub const MAX_BUCKETS: usize = BLOCK_SIZE * MAX_SCAN_BLOCKS;

/// How blocks of one dispatch are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Blocks run concurrently on the rayon pool. Atomic resolution order,
    /// and with it the order inside a bucket, is unspecified.
    #[default]
    Parallel,
    /// Blocks run in index order on the calling thread. Every atomic resolves
    /// in source order, which makes the sort stable and passes replayable.
    Sequential,
}

/// Number of blocks needed to cover `items` at `per_block` items each.
#[inline]
pub fn block_count(items: usize, per_block: usize) -> usize {
    items.div_ceil(per_block)
}

/// Round `n` up to the next multiple of [`BLOCK_SIZE`].
#[inline]
pub fn round_up_to_block(n: usize) -> usize {
    block_count(n, BLOCK_SIZE) * BLOCK_SIZE
}

/// Dispatch one block per `chunk`-sized slice of `data`. Blocks own disjoint
/// slices, so writes need no synchronisation.
pub fn dispatch_chunks_mut<T, F>(mode: DispatchMode, data: &mut [T], chunk: usize, kernel: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    match mode {
        DispatchMode::Parallel => data
            .par_chunks_mut(chunk)
            .enumerate()
            .for_each(|(block, slice)| kernel(block, slice)),
        DispatchMode::Sequential => data
            .chunks_mut(chunk)
            .enumerate()
            .for_each(|(block, slice)| kernel(block, slice)),
    }
}

/// Like [`dispatch_chunks_mut`], but every block also owns one slot of
/// `per_block` (block totals, for instance).
pub fn dispatch_chunks_with<T, U, F>(
    mode: DispatchMode,
    data: &mut [T],
    chunk: usize,
    per_block: &mut [U],
    kernel: F,
) where
    T: Send,
    U: Send,
    F: Fn(usize, &mut [T], &mut U) + Send + Sync,
{
    debug_assert!(per_block.len() >= block_count(data.len(), chunk));
    match mode {
        DispatchMode::Parallel => data
            .par_chunks_mut(chunk)
            .zip(per_block.par_iter_mut())
            .enumerate()
            .for_each(|(block, (slice, slot))| kernel(block, slice, slot)),
        DispatchMode::Sequential => data
            .chunks_mut(chunk)
            .zip(per_block.iter_mut())
            .enumerate()
            .for_each(|(block, (slice, slot))| kernel(block, slice, slot)),
    }
}

/// Dispatch over two equally long arrays, one lane per element of both.
pub fn dispatch_pairs_mut<A, B, F>(
    mode: DispatchMode,
    a: &mut [A],
    b: &mut [B],
    chunk: usize,
    kernel: F,
) where
    A: Send,
    B: Send,
    F: Fn(usize, &mut [A], &mut [B]) + Send + Sync,
{
    debug_assert_eq!(a.len(), b.len());
    match mode {
        DispatchMode::Parallel => a
            .par_chunks_mut(chunk)
            .zip(b.par_chunks_mut(chunk))
            .enumerate()
            .for_each(|(block, (a, b))| kernel(block, a, b)),
        DispatchMode::Sequential => a
            .chunks_mut(chunk)
            .zip(b.chunks_mut(chunk))
            .enumerate()
            .for_each(|(block, (a, b))| kernel(block, a, b)),
    }
}

/// Dispatch `blocks` blocks that only read shared inputs or write through a
/// [`ScatterTarget`] / atomics.
pub fn dispatch_blocks<F>(mode: DispatchMode, blocks: usize, kernel: F)
where
    F: Fn(usize) + Send + Sync,
{
    match mode {
        DispatchMode::Parallel => (0..blocks).into_par_iter().for_each(kernel),
        DispatchMode::Sequential => (0..blocks).for_each(kernel),
    }
}

const _: () = assert!(std::mem::align_of::<AtomicU32>() == std::mem::align_of::<u32>());
const _: () = assert!(std::mem::size_of::<AtomicU32>() == std::mem::size_of::<u32>());

/// View a plain counter array as atomics for the duration of a dispatch.
///
/// Counters live as `u32` so the scan and span lookups read them directly;
/// only the counting kernel needs atomic access.
pub fn atomic_view(counters: &mut [u32]) -> &[AtomicU32] {
    // SAFETY: `AtomicU32` has the same size, alignment (asserted above) and
    // bit validity as `u32`. The exclusive borrow means no non-atomic access
    // can alias the returned view while it lives.
    unsafe { &*(counters as *mut [u32] as *const [AtomicU32]) }
}

/// Write-only global memory shared by every lane of a dispatch.
///
/// Used where the destination of a lane is computed (scatter, geometry
/// emission) rather than known from the block index.
pub struct ScatterTarget<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: lanes only write through the target, and `write` requires callers
// to guarantee that no index is written twice within a dispatch.
unsafe impl<T: Send> Send for ScatterTarget<'_, T> {}
unsafe impl<T: Send> Sync for ScatterTarget<'_, T> {}

impl<'a, T: Copy> ScatterTarget<'a, T> {
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store `value` at `index`.
    ///
    /// # Safety
    ///
    /// No other lane of the same dispatch may write `index`.
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds.
    #[inline]
    pub unsafe fn write(&self, index: usize, value: T) {
        assert!(
            index < self.len,
            "scatter index {index} out of bounds for length {}",
            self.len
        );
        // SAFETY: bounds checked above; exclusivity is the caller's contract.
        // `T: Copy`, so overwriting without dropping the old value is fine.
        unsafe { self.ptr.add(index).write(value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_block_rounding() {
        assert_eq!(round_up_to_block(0), 0);
        assert_eq!(round_up_to_block(1), BLOCK_SIZE);
        assert_eq!(round_up_to_block(BLOCK_SIZE), BLOCK_SIZE);
        assert_eq!(round_up_to_block(BLOCK_SIZE + 1), 2 * BLOCK_SIZE);
        assert_eq!(block_count(5000, LANES_PER_BLOCK), 10);
    }

    #[test]
    fn test_chunk_dispatch_sees_block_indices() {
        for mode in [DispatchMode::Parallel, DispatchMode::Sequential] {
            let mut data = vec![0usize; 10];
            dispatch_chunks_mut(mode, &mut data, 4, |block, slice| {
                for value in slice.iter_mut() {
                    *value = block;
                }
            });
            assert_eq!(data, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
        }
    }

    #[test]
    fn test_per_block_slots() {
        let mut data: Vec<u32> = (0..8).collect();
        let mut totals = vec![0u32; 2];
        dispatch_chunks_with(DispatchMode::Parallel, &mut data, 4, &mut totals, |_, slice, total| {
            *total = slice.iter().sum();
        });
        assert_eq!(totals, vec![6, 22]);
    }

    #[test]
    fn test_atomic_view_writes_through() {
        let mut counters = vec![0u32; 4];
        {
            let atomics = atomic_view(&mut counters);
            dispatch_blocks(DispatchMode::Parallel, 64, |block| {
                atomics[block % 4].fetch_add(1, Ordering::Relaxed);
            });
        }
        assert_eq!(counters, vec![16, 16, 16, 16]);
    }

    #[test]
    fn test_scatter_target_permutes() {
        let input = [10u32, 20, 30, 40];
        let dest = [3usize, 0, 2, 1];
        let mut output = [0u32; 4];
        {
            let target = ScatterTarget::new(&mut output);
            dispatch_blocks(DispatchMode::Parallel, input.len(), |i| {
                // SAFETY: `dest` is a permutation.
                unsafe { target.write(dest[i], input[i]) };
            });
        }
        assert_eq!(output, [20, 40, 30, 10]);
    }
}
