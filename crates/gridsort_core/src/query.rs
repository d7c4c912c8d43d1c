//! Neighbourhood queries over a sorted item array
//!
//! After a sort pass every bucket is a contiguous span, so visiting the
//! 27 cells around a position is 27 slice reads.

use crate::counter::SpatialItem;
use crate::grid::GridLayout;
use crate::sort::CellSpans;
use glam::Vec3;

/// Read-only view pairing sorted items with their bucket spans.
#[derive(Debug, Clone, Copy)]
pub struct GridQuery<'a, T> {
    grid: &'a GridLayout,
    items: &'a [T],
    spans: CellSpans<'a>,
}

impl<'a, T: SpatialItem> GridQuery<'a, T> {
    /// `items` must be the output of the sort pass that produced `spans`.
    pub fn new(grid: &'a GridLayout, items: &'a [T], spans: CellSpans<'a>) -> Self {
        debug_assert_eq!(items.len(), spans.total() as usize);
        Self { grid, items, spans }
    }

    #[inline]
    pub fn items(&self) -> &'a [T] {
        self.items
    }

    #[inline]
    pub fn spans(&self) -> CellSpans<'a> {
        self.spans
    }

    /// Items in bucket `key`.
    #[inline]
    pub fn cell(&self, key: u32) -> &'a [T] {
        &self.items[self.spans.span(key)]
    }

    /// Every item in the 3×3×3 block of cells around `position`.
    pub fn neighbors(&self, position: Vec3) -> impl Iterator<Item = &'a T> + '_ {
        let (cell, _) = self.grid.cell_of(position);
        self.grid
            .neighbor_keys(cell)
            .flat_map(move |key| self.cell(key).iter())
    }

    /// Stencil items no farther than `radius` from `position`.
    pub fn neighbors_within(
        &self,
        position: Vec3,
        radius: f32,
    ) -> impl Iterator<Item = &'a T> + '_ {
        let radius_sq = radius * radius;
        self.neighbors(position)
            .filter(move |item| item.position().distance_squared(position) <= radius_sq)
    }
}
