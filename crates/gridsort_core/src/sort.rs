//! Spatial counting sort
//!
//! One pass is four dispatches over buffers allocated at setup:
//! clear → count → scan → scatter. The scanned offsets survive the pass and
//! describe where every bucket lives in the sorted output.

use crate::counter::{self, GridEntry, SpatialItem};
use crate::device::DispatchMode;
use crate::error::SetupError;
use crate::grid::GridLayout;
use crate::scan::HierarchicalScan;
use crate::scatter::scatter;
use gridsort_metrics::{time_stage, PassProfiler};
use std::ops::Range;
use tracing::debug;

/// Bucket spans of the last sort pass.
///
/// `start(k)` for `k >= bucket_count()` is the total, so the span of the
/// last bucket is well defined.
#[derive(Debug, Clone, Copy)]
pub struct CellSpans<'a> {
    offsets: &'a [u32],
    total: u32,
}

impl<'a> CellSpans<'a> {
    pub fn new(offsets: &'a [u32], total: u32) -> Self {
        Self { offsets, total }
    }

    /// Number of items sorted.
    #[inline]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.offsets.len()
    }

    /// Exclusive prefix sum of the bucket counts.
    #[inline]
    pub fn offsets(&self) -> &'a [u32] {
        self.offsets
    }

    #[inline]
    pub fn start(&self, key: usize) -> u32 {
        self.offsets.get(key).copied().unwrap_or(self.total)
    }

    /// Range of the sorted output holding bucket `key`.
    #[inline]
    pub fn span(&self, key: u32) -> Range<usize> {
        let key = key as usize;
        self.start(key) as usize..self.start(key + 1) as usize
    }

    #[inline]
    pub fn count(&self, key: u32) -> u32 {
        self.start(key as usize + 1) - self.start(key as usize)
    }

    /// The offsets followed by the total: `M + 1` entries.
    pub fn cell_offsets(&self) -> impl Iterator<Item = u32> + 'a {
        self.offsets.iter().copied().chain(std::iter::once(self.total))
    }
}

/// Counting sort of items into grid buckets.
///
/// Owns the offset, block-sum and per-item entry arrays; the caller owns the
/// input and output item arrays.
#[derive(Debug)]
pub struct SpatialSorter {
    grid: GridLayout,
    capacity: usize,
    mode: DispatchMode,
    offsets: Box<[u32]>,
    entries: Box<[GridEntry]>,
    scan: HierarchicalScan<u32>,
    pass_len: usize,
    total: u32,
    clamped: u32,
    profiler: PassProfiler,
}

impl SpatialSorter {
    /// Allocate buffers for up to `capacity` items on `grid`.
    pub fn new(grid: GridLayout, capacity: usize, mode: DispatchMode) -> Result<Self, SetupError> {
        let scan = HierarchicalScan::new(grid.bucket_capacity(), mode)?;
        Ok(Self {
            grid,
            capacity,
            mode,
            offsets: vec![0; grid.bucket_capacity()].into_boxed_slice(),
            entries: vec![GridEntry::default(); capacity].into_boxed_slice(),
            scan,
            pass_len: 0,
            total: 0,
            clamped: 0,
            profiler: PassProfiler::new(),
        })
    }

    #[inline]
    pub fn grid(&self) -> &GridLayout {
        &self.grid
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Items that fell outside the grid during the last pass.
    #[inline]
    pub fn clamped_last_pass(&self) -> u32 {
        self.clamped
    }

    /// `(key, rank)` per input item of the last pass.
    #[inline]
    pub fn entries(&self) -> &[GridEntry] {
        &self.entries[..self.pass_len]
    }

    /// Spans of the last pass.
    #[inline]
    pub fn spans(&self) -> CellSpans<'_> {
        CellSpans::new(&self.offsets, self.total)
    }

    #[inline]
    pub fn profiler(&self) -> &PassProfiler {
        &self.profiler
    }

    #[inline]
    pub fn profiler_mut(&mut self) -> &mut PassProfiler {
        &mut self.profiler
    }

    /// Sort `items` into `output` by bucket key.
    pub fn sort<T: SpatialItem>(
        &mut self,
        items: &[T],
        output: &mut [T],
    ) -> Result<CellSpans<'_>, SetupError> {
        let n = items.len();
        if n > self.capacity {
            return Err(SetupError::CapacityExceeded {
                requested: n,
                capacity: self.capacity,
            });
        }
        if output.len() != n {
            return Err(SetupError::OutputMismatch {
                input: n,
                output: output.len(),
            });
        }

        time_stage!(self.profiler, "clear", {
            counter::clear(self.mode, &mut self.offsets);
        });
        let clamped = time_stage!(self.profiler, "count", {
            counter::count(self.mode, &self.grid, items, &mut self.offsets, &mut self.entries[..n])
        });
        let total = time_stage!(self.profiler, "scan", { self.scan.run(&mut self.offsets) });
        time_stage!(self.profiler, "scatter", {
            scatter(self.mode, items, &self.entries[..n], &self.offsets, output);
        });

        debug_assert_eq!(total as usize, n);
        self.pass_len = n;
        self.total = total;
        self.clamped = clamped;
        debug!(items = n, clamped, "sort pass");

        Ok(self.spans())
    }
}
