//! Active-cell compaction
//!
//! Every cell of the chunk writes how many vertices it owns and how many
//! triangles it emits; one hierarchical scan over those pairs gives each
//! cell its write offsets and the totals feed the indirect draw.

use super::density::DensityVolume;
use super::tables::{case_index, triangle_count, CORNER_OFFSETS, SLOT_CORNERS};
use crate::counter;
use crate::device::{dispatch_pairs_mut, DispatchMode, LANES_PER_BLOCK, MAX_BUCKETS};
use crate::error::SetupError;
use crate::scan::{HierarchicalScan, ScanValue};
use bytemuck::{Pod, Zeroable};
use glam::UVec3;
use std::ops::Add;
use tracing::trace;

/// Largest chunk whose cell count fits the two-level scan (101³ ≤ 1024²).
pub const MAX_CHUNK_SIZE: u32 = 101;
/// Smallest chunk with at least one cell that emits triangles.
pub const MIN_CHUNK_SIZE: u32 = 2;

/// Per-cell output sizes, scanned component-wise.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct CellCounts {
    pub vertices: u32,
    pub triangles: u32,
}

impl Add for CellCounts {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            vertices: self.vertices + rhs.vertices,
            triangles: self.triangles + rhs.triangles,
        }
    }
}

impl ScanValue for CellCounts {}

/// Packed classification of one cell: case index in the low byte, crossing
/// mask of the owned edge slots in bits 8..11.
#[inline]
pub fn pack_cell(case: u8, edge_mask: u32) -> u32 {
    u32::from(case) | (edge_mask << 8)
}

#[inline]
pub fn cell_case(data: u32) -> u8 {
    (data & 0xff) as u8
}

#[inline]
pub fn cell_edge_mask(data: u32) -> u32 {
    (data >> 8) & 0b111
}

/// Fixed buffers for compacting one chunk.
#[derive(Debug)]
pub struct CellCompactor {
    chunk_size: u32,
    cell_count: usize,
    counts: Box<[CellCounts]>,
    cell_data: Box<[u32]>,
    scan: HierarchicalScan<CellCounts>,
    total: CellCounts,
    mode: DispatchMode,
}

impl CellCompactor {
    pub fn new(chunk_size: u32, mode: DispatchMode) -> Result<Self, SetupError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(SetupError::ChunkSize {
                chunk_size,
                min: MIN_CHUNK_SIZE,
                max: MAX_CHUNK_SIZE,
            });
        }
        let cell_count = (chunk_size as usize).pow(3);
        debug_assert!(cell_count <= MAX_BUCKETS);
        let scan = HierarchicalScan::new(cell_count, mode)?;

        Ok(Self {
            chunk_size,
            cell_count,
            counts: vec![CellCounts::default(); scan.capacity()].into_boxed_slice(),
            cell_data: vec![0; scan.capacity()].into_boxed_slice(),
            scan,
            total: CellCounts::default(),
            mode,
        })
    }

    #[inline]
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Scanned capacity: cell count rounded up to whole blocks.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn cell_index(&self, cell: UVec3) -> usize {
        (cell.x + self.chunk_size * (cell.y + self.chunk_size * cell.z)) as usize
    }

    #[inline]
    pub fn cell_coord(&self, index: usize) -> UVec3 {
        let n = self.chunk_size as usize;
        UVec3::new((index % n) as u32, ((index / n) % n) as u32, (index / (n * n)) as u32)
    }

    /// Cells on the high boundary own vertices but never emit triangles:
    /// their triangles would need owners outside the chunk.
    #[inline]
    pub fn is_phantom(&self, cell: UVec3) -> bool {
        cell.cmpeq(UVec3::splat(self.chunk_size - 1)).any()
    }

    /// Counts after [`CellCompactor::mark_cells`], offsets after
    /// [`CellCompactor::compact`].
    #[inline]
    pub fn counts(&self) -> &[CellCounts] {
        &self.counts
    }

    #[inline]
    pub fn cell_data(&self) -> &[u32] {
        &self.cell_data[..self.cell_count]
    }

    /// Totals of the last compaction.
    #[inline]
    pub fn total(&self) -> CellCounts {
        self.total
    }

    /// Classify every cell of `volume` against `iso_level`. The volume
    /// must hold `chunk_size + 1` samples per axis.
    pub fn mark_cells(&mut self, volume: &DensityVolume, iso_level: f32) -> Result<(), SetupError> {
        if volume.dim() != self.chunk_size + 1 {
            return Err(SetupError::LatticeSize {
                expected: self.chunk_size + 1,
                actual: volume.dim(),
            });
        }

        counter::clear(self.mode, &mut self.counts);
        let cells = self.cell_count;
        let n = self.chunk_size as usize;
        let last = self.chunk_size - 1;

        dispatch_pairs_mut(
            self.mode,
            &mut self.counts[..cells],
            &mut self.cell_data[..cells],
            LANES_PER_BLOCK,
            |block, counts, data| {
                let base = block * LANES_PER_BLOCK;
                for (lane, (count, packed)) in counts.iter_mut().zip(data.iter_mut()).enumerate() {
                    let i = base + lane;
                    let cell =
                        UVec3::new((i % n) as u32, ((i / n) % n) as u32, (i / (n * n)) as u32);
                    let corners = CORNER_OFFSETS.map(|offset| volume.get(cell + offset));
                    let case = case_index(&corners, iso_level);

                    let inside = corners[0] > iso_level;
                    let edge_mask = SLOT_CORNERS
                        .iter()
                        .enumerate()
                        .filter(|&(_, &far)| (corners[far] > iso_level) != inside)
                        .fold(0u32, |mask, (slot, _)| mask | (1 << slot));

                    let phantom = cell.cmpeq(UVec3::splat(last)).any();
                    *count = CellCounts {
                        vertices: edge_mask.count_ones(),
                        triangles: if phantom { 0 } else { triangle_count(case) },
                    };
                    *packed = pack_cell(case, edge_mask);
                }
            },
        );
        trace!(cells, "mark cells");
        Ok(())
    }

    /// Scan the marked counts into write offsets. Returns the totals.
    pub fn compact(&mut self) -> CellCounts {
        self.total = self.scan.run(&mut self.counts);
        self.total
    }
}
