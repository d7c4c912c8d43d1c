//! gridsort core
//!
//! Hierarchical prefix-sum counting sort and stream compaction, written as
//! block-structured kernels and executed on a CPU reference device:
//! - Bucket counting with atomic ranks ([`counter`])
//! - Two-level Blelloch scan ([`scan`])
//! - Scatter into contiguous bucket spans ([`scatter`], [`sort`])
//! - 27-cell neighbourhood queries ([`query`])
//! - Boid flocking and marching-cubes compaction built on top ([`boids`], [`terrain`])

pub mod boids;
pub mod counter;
pub mod device;
pub mod error;
pub mod grid;
pub mod indirect;
pub mod math;
pub mod query;
pub mod scan;
pub mod scatter;
pub mod sort;
pub mod terrain;
pub mod time;

pub use glam;

pub use counter::{GridEntry, SpatialItem};
pub use device::{DispatchMode, BLOCK_SIZE, LANES_PER_BLOCK, MAX_BUCKETS};
pub use error::SetupError;
pub use grid::GridLayout;
pub use indirect::{DrawMode, IndirectDrawArgs};
pub use query::GridQuery;
pub use scan::{HierarchicalScan, ScanValue};
pub use sort::{CellSpans, SpatialSorter};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
