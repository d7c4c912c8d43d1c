//! Uniform grid layout
//!
//! Maps world positions to cell coordinates and bucket keys, and enumerates
//! the 3×3×3 stencil around a cell. Computed once at setup; the bucket
//! capacity derived here sizes every per-bucket array of a pass.

use crate::device::{round_up_to_block, BLOCK_SIZE, MAX_BUCKETS};
use crate::error::SetupError;
use glam::{IVec3, UVec3, Vec3};
use tracing::info;

const fn neighbor_offsets() -> [IVec3; 27] {
    let mut out = [IVec3::ZERO; 27];
    let mut i = 0;
    while i < 27 {
        out[i] = IVec3::new(
            (i % 3) as i32 - 1,
            ((i / 3) % 3) as i32 - 1,
            (i / 9) as i32 - 1,
        );
        i += 1;
    }
    out
}

/// The cell itself and its 26 surrounding cells, x fastest.
pub const NEIGHBOR_OFFSETS: [IVec3; 27] = neighbor_offsets();

/// Dimensions and placement of a uniform grid.
///
/// Keys are `x + dim.x * (y + dim.y * z)`. Positions outside the grid clamp
/// to the nearest boundary cell per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    dims: UVec3,
    cell_size: f32,
    origin: Vec3,
    cell_count: usize,
    bucket_capacity: usize,
}

impl GridLayout {
    /// Grid of `dims` cells of edge `cell_size` whose cell (0,0,0) starts at
    /// `origin`.
    pub fn new(dims: UVec3, cell_size: f32, origin: Vec3) -> Result<Self, SetupError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(SetupError::InvalidCellSize { cell_size });
        }
        if dims.cmpeq(UVec3::ZERO).any() {
            return Err(SetupError::EmptyGrid {
                dims: dims.to_array(),
            });
        }

        // Three u32 factors cannot overflow u128.
        let requested = u128::from(dims.x) * u128::from(dims.y) * u128::from(dims.z);
        if requested > MAX_BUCKETS as u128 {
            return Err(SetupError::TooManyBuckets {
                requested,
                max: MAX_BUCKETS,
            });
        }

        let cell_count = requested as usize;
        Ok(Self {
            dims,
            cell_size,
            origin,
            cell_count,
            bucket_capacity: round_up_to_block(cell_count),
        })
    }

    /// Grid covering the box `[-bounds, bounds]` with cells of
    /// `visual_range * cell_scale`, plus one margin cell on every side.
    pub fn from_bounds(
        bounds: Vec3,
        visual_range: f32,
        cell_scale: f32,
    ) -> Result<Self, SetupError> {
        let cell_size = visual_range * cell_scale;
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(SetupError::InvalidCellSize { cell_size });
        }

        // Negative or NaN extents saturate to zero and fail as an empty grid.
        let dims = ((bounds * 2.0 / cell_size).floor() + Vec3::splat(2.0)).as_uvec3();
        let layout = Self::new(dims, cell_size, -bounds - Vec3::splat(cell_size))?;

        info!(
            cell_size,
            dims = ?layout.dims.to_array(),
            cells = layout.cell_count,
            buckets = layout.bucket_capacity,
            blocks = layout.block_count(),
            "grid layout"
        );
        Ok(layout)
    }

    #[inline]
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// `dim.x * dim.y * dim.z`.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Cell count rounded up to a whole number of scan blocks.
    #[inline]
    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }

    /// Scan blocks covering the bucket capacity.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.bucket_capacity / BLOCK_SIZE
    }

    /// Cell containing `position`, and whether it had to be clamped.
    #[inline]
    pub fn cell_of(&self, position: Vec3) -> (UVec3, bool) {
        let raw = ((position - self.origin) / self.cell_size).floor();
        let max = (self.dims - UVec3::ONE).as_vec3();
        let cell = raw.clamp(Vec3::ZERO, max);
        // NaN never compares equal, so it counts as clamped too.
        (cell.as_uvec3(), cell != raw)
    }

    #[inline]
    pub fn key(&self, coord: UVec3) -> u32 {
        coord.x + self.dims.x * (coord.y + self.dims.y * coord.z)
    }

    /// Bucket key of `position`, clamped into the grid.
    #[inline]
    pub fn key_of(&self, position: Vec3) -> u32 {
        self.key(self.cell_of(position).0)
    }

    /// Inverse of [`GridLayout::key`].
    #[inline]
    pub fn coord_of(&self, key: u32) -> UVec3 {
        let x = key % self.dims.x;
        let yz = key / self.dims.x;
        UVec3::new(x, yz % self.dims.y, yz / self.dims.y)
    }

    /// Keys of the stencil cells around `coord` that lie inside the grid.
    pub fn neighbor_keys(&self, coord: UVec3) -> impl Iterator<Item = u32> {
        let grid = *self;
        let center = coord.as_ivec3();
        let dims = grid.dims.as_ivec3();
        NEIGHBOR_OFFSETS
            .into_iter()
            .map(move |offset| center + offset)
            .filter(move |cell| cell.cmpge(IVec3::ZERO).all() && cell.cmplt(dims).all())
            .map(move |cell| grid.key(cell.as_uvec3()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_boid_grid() -> GridLayout {
        GridLayout::from_bounds(Vec3::splat(10.0), 0.5, 1.0).unwrap()
    }

    #[test]
    fn test_sizing_matches_bounds() {
        let grid = default_boid_grid();
        assert_eq!(grid.dims(), UVec3::splat(42));
        assert_eq!(grid.cell_count(), 42 * 42 * 42);
        assert_eq!(grid.bucket_capacity() % BLOCK_SIZE, 0);
        assert_eq!(grid.bucket_capacity(), 73 * BLOCK_SIZE);
        assert_eq!(grid.block_count(), 73);
    }

    #[test]
    fn test_margin_ring() {
        let grid = default_boid_grid();
        assert_eq!(grid.cell_of(Vec3::ZERO), (UVec3::splat(21), false));
        assert_eq!(grid.cell_of(Vec3::splat(-10.0)), (UVec3::ONE, false));
    }

    #[test]
    fn test_out_of_bounds_clamps() {
        let grid = default_boid_grid();
        assert_eq!(grid.cell_of(Vec3::splat(-100.0)), (UVec3::ZERO, true));
        assert_eq!(grid.cell_of(Vec3::new(100.0, 0.0, 0.0)), (UVec3::new(41, 21, 21), true));
        let (_, clamped) = grid.cell_of(Vec3::new(f32::NAN, 0.0, 0.0));
        assert!(clamped);
        assert!((grid.key_of(Vec3::splat(1e9)) as usize) < grid.cell_count());
    }

    #[test]
    fn test_key_roundtrip() {
        let grid = GridLayout::new(UVec3::new(3, 4, 5), 1.0, Vec3::ZERO).unwrap();
        for key in 0..grid.cell_count() as u32 {
            assert_eq!(grid.key(grid.coord_of(key)), key);
        }
        assert_eq!(grid.key(UVec3::new(1, 2, 3)), 1 + 3 * (2 + 4 * 3));
    }

    #[test]
    fn test_stencil_skips_outside_cells() {
        let grid = GridLayout::new(UVec3::splat(4), 1.0, Vec3::ZERO).unwrap();
        assert_eq!(grid.neighbor_keys(UVec3::ZERO).count(), 8);
        assert_eq!(grid.neighbor_keys(UVec3::new(1, 0, 1)).count(), 18);
        let interior: Vec<u32> = grid.neighbor_keys(UVec3::ONE).collect();
        assert_eq!(interior.len(), 27);
        assert!(interior.contains(&grid.key(UVec3::ONE)));
    }

    #[test]
    fn test_setup_rejections() {
        assert!(matches!(
            GridLayout::new(UVec3::new(1025, 1024, 1), 1.0, Vec3::ZERO),
            Err(SetupError::TooManyBuckets { requested: 1_049_600, .. })
        ));
        assert!(GridLayout::new(UVec3::new(1024, 1024, 1), 1.0, Vec3::ZERO).is_ok());
        assert!(matches!(
            GridLayout::new(UVec3::new(4, 0, 4), 1.0, Vec3::ZERO),
            Err(SetupError::EmptyGrid { .. })
        ));
        assert!(matches!(
            GridLayout::from_bounds(Vec3::ONE, 0.0, 1.0),
            Err(SetupError::InvalidCellSize { .. })
        ));
        assert!(matches!(
            GridLayout::from_bounds(Vec3::splat(1000.0), 0.5, 1.0),
            Err(SetupError::TooManyBuckets { .. })
        ));
    }

    #[test]
    fn test_huge_grids_are_rejected_without_overflow() {
        assert!(matches!(
            GridLayout::new(UVec3::new(1 << 31, 1 << 31, 4), 1.0, Vec3::ZERO),
            Err(SetupError::TooManyBuckets { requested, .. }) if requested == 1u128 << 64
        ));
        assert!(matches!(
            GridLayout::new(UVec3::splat(u32::MAX), 1.0, Vec3::ZERO),
            Err(SetupError::TooManyBuckets { .. })
        ));
        // Extents this large saturate every axis to u32::MAX.
        assert!(matches!(
            GridLayout::from_bounds(Vec3::splat(1e30), 0.5, 1.0),
            Err(SetupError::TooManyBuckets { .. })
        ));
    }
}
