//! WGSL sources
//!
//! Grid and chunk kernels share a prelude with their uniform layout. The
//! scan is written once over `ScanValue`; each element type gets its own
//! prelude.

pub const CLEAR: &str = include_str!("shaders/clear.wgsl");

pub const COUNT_BOIDS: &str = concat!(
    include_str!("shaders/grid_common.wgsl"),
    include_str!("shaders/count.wgsl")
);

pub const SCATTER_BOIDS: &str = concat!(
    include_str!("shaders/grid_common.wgsl"),
    include_str!("shaders/scatter.wgsl")
);

pub const MARK_CELLS: &str = concat!(
    include_str!("shaders/chunk_common.wgsl"),
    include_str!("shaders/mark_cells.wgsl")
);

pub const WRITE_ARGS: &str = concat!(
    include_str!("shaders/chunk_common.wgsl"),
    include_str!("shaders/write_args.wgsl")
);

const SCAN_BODY: &str = include_str!("shaders/scan.wgsl");

/// Element type of a device scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// One `u32` per bucket.
    Counters,
    /// `(vertices, triangles)` per cell.
    Pairs,
}

impl ScanKind {
    fn prelude(self) -> &'static str {
        match self {
            Self::Counters => "alias ScanValue = u32;\nconst SCAN_ZERO: ScanValue = 0u;\n",
            Self::Pairs => {
                "alias ScanValue = vec2<u32>;\nconst SCAN_ZERO: ScanValue = vec2<u32>(0u, 0u);\n"
            }
        }
    }

    /// Bytes per element.
    pub fn element_size(self) -> u64 {
        match self {
            Self::Counters => 4,
            Self::Pairs => 8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Counters => "scan counters",
            Self::Pairs => "scan pairs",
        }
    }
}

pub fn scan_source(kind: ScanKind) -> String {
    format!("{}{}", kind.prelude(), SCAN_BODY)
}

/// Every complete module, by name.
pub fn all_sources() -> Vec<(&'static str, String)> {
    vec![
        ("clear", CLEAR.to_string()),
        ("count_boids", COUNT_BOIDS.to_string()),
        ("scatter_boids", SCATTER_BOIDS.to_string()),
        ("mark_cells", MARK_CELLS.to_string()),
        ("write_args", WRITE_ARGS.to_string()),
        (ScanKind::Counters.label(), scan_source(ScanKind::Counters)),
        (ScanKind::Pairs.label(), scan_source(ScanKind::Pairs)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_preludes() {
        assert!(scan_source(ScanKind::Counters).starts_with("alias ScanValue = u32;"));
        assert!(scan_source(ScanKind::Pairs).contains("vec2<u32>(0u, 0u)"));
        assert_eq!(all_sources().len(), 7);
    }

    #[test]
    fn test_kernels_share_uniform_layout() {
        for source in [COUNT_BOIDS, SCATTER_BOIDS] {
            assert!(source.contains("var<uniform> grid: GridParams"));
        }
        for source in [MARK_CELLS, WRITE_ARGS] {
            assert!(source.contains("var<uniform> chunk: ChunkParams"));
        }
    }
}
