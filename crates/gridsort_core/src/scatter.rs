//! Scatter/reorder kernel

use crate::counter::GridEntry;
use crate::device::{block_count, dispatch_blocks, DispatchMode, ScatterTarget, LANES_PER_BLOCK};

/// Write every item to `offsets[key] + rank`.
///
/// `offsets` must be the exclusive scan of the counts that produced
/// `entries`, so destinations form a permutation of `0..items.len()` and
/// every slot of `output` is overwritten exactly once.
pub fn scatter<T: Copy + Send + Sync>(
    mode: DispatchMode,
    items: &[T],
    entries: &[GridEntry],
    offsets: &[u32],
    output: &mut [T],
) {
    debug_assert_eq!(items.len(), entries.len());
    debug_assert_eq!(items.len(), output.len());

    let len = items.len();
    let target = ScatterTarget::new(output);
    dispatch_blocks(mode, block_count(len, LANES_PER_BLOCK), |block| {
        let start = block * LANES_PER_BLOCK;
        let end = (start + LANES_PER_BLOCK).min(len);
        for i in start..end {
            let entry = entries[i];
            let dst = offsets[entry.key as usize] as usize + entry.rank as usize;
            // SAFETY: ranks are unique within a bucket and below its count, so
            // (key, rank) pairs map to distinct destinations.
            unsafe { target.write(dst, items[i]) };
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scatter_groups_by_key() {
        let items = ['a', 'b', 'c', 'd', 'e'];
        let entries =
            [(2, 0), (0, 0), (2, 1), (1, 0), (0, 1)].map(|(key, rank)| GridEntry { key, rank });
        let offsets = [0, 2, 3];
        let mut output = ['_'; 5];
        scatter(DispatchMode::Parallel, &items, &entries, &offsets, &mut output);
        assert_eq!(output, ['b', 'e', 'd', 'a', 'c']);
    }

    #[test]
    fn test_empty_pass_writes_nothing() {
        let mut output: [u32; 0] = [];
        scatter(DispatchMode::Parallel, &[], &[], &[0], &mut output);
    }
}
