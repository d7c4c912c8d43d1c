//! Terrain variant: marching cubes over a compacted chunk
//!
//! A tick samples the density lattice, marks every cell, scans the
//! per-cell vertex/triangle counts, writes the draw arguments from the
//! totals, and emits geometry at the scanned offsets.

mod compaction;
mod density;
mod mesh;
pub mod tables;

pub use compaction::{
    cell_case, cell_edge_mask, pack_cell, CellCompactor, CellCounts, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};
pub use density::{DensityField, DensityVolume, FieldConfig, LayeredField, SphereField};
pub use mesh::{emit, LatticeFrame, TerrainMesh, TerrainVertex};

use crate::device::DispatchMode;
use crate::error::SetupError;
use crate::indirect::{DrawMode, IndirectDrawArgs};
use glam::Vec3;
use gridsort_metrics::{time_stage, PassProfiler};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Chunk configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Cells per axis, including the phantom layer.
    pub chunk_size: u32,
    pub iso_level: f32,
    /// World distance between lattice points.
    pub voxel_size: f32,
    pub origin: [f32; 3],
    pub draw_mode: DrawMode,
    pub field: FieldConfig,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            chunk_size: 33,
            iso_level: 0.0,
            voxel_size: 1.0,
            origin: [0.0; 3],
            draw_mode: DrawMode::ProxyInstanced,
            field: FieldConfig::default(),
        }
    }
}

impl TerrainParams {
    pub fn frame(&self) -> LatticeFrame {
        LatticeFrame {
            origin: Vec3::from_array(self.origin),
            spacing: self.voxel_size,
        }
    }
}

/// Owns every buffer of one chunk, allocated at worst case.
#[derive(Debug)]
pub struct TerrainExtractor {
    params: TerrainParams,
    volume: DensityVolume,
    compactor: CellCompactor,
    mesh: TerrainMesh,
    mode: DispatchMode,
    profiler: PassProfiler,
}

impl TerrainExtractor {
    pub fn new(params: TerrainParams, mode: DispatchMode) -> Result<Self, SetupError> {
        if !(params.voxel_size.is_finite() && params.voxel_size > 0.0) {
            return Err(SetupError::InvalidCellSize {
                cell_size: params.voxel_size,
            });
        }
        let compactor = CellCompactor::new(params.chunk_size, mode)?;
        let volume = DensityVolume::new(params.chunk_size + 1);
        let mesh = TerrainMesh::with_cell_capacity(compactor.cell_count());

        info!(
            chunk_size = params.chunk_size,
            cells = compactor.cell_count(),
            buckets = compactor.capacity(),
            vertex_capacity = mesh.vertex_capacity(),
            index_capacity = mesh.index_capacity(),
            "terrain chunk ready"
        );

        Ok(Self {
            params,
            volume,
            compactor,
            mesh,
            mode,
            profiler: PassProfiler::new(),
        })
    }

    /// Sample `field` and rebuild the chunk mesh.
    pub fn extract<F: DensityField>(&mut self, field: &F) -> Result<&TerrainMesh, SetupError> {
        let frame = self.params.frame();
        time_stage!(self.profiler, "density", {
            self.volume.sample(self.mode, field, frame.origin, frame.spacing);
        });
        self.rebuild()
    }

    /// Rebuild from the configured field.
    pub fn extract_configured(&mut self) -> Result<&TerrainMesh, SetupError> {
        let field = self.params.field;
        self.extract(&field)
    }

    /// Rebuild the mesh from an already filled lattice of `chunk_size + 1`
    /// samples per axis.
    pub fn extract_volume(&mut self, volume: DensityVolume) -> Result<&TerrainMesh, SetupError> {
        let expected = self.params.chunk_size + 1;
        if volume.dim() != expected {
            return Err(SetupError::LatticeSize {
                expected,
                actual: volume.dim(),
            });
        }
        self.volume = volume;
        self.rebuild()
    }

    fn rebuild(&mut self) -> Result<&TerrainMesh, SetupError> {
        let iso = self.params.iso_level;
        time_stage!(self.profiler, "mark", { self.compactor.mark_cells(&self.volume, iso) })?;
        let total = time_stage!(self.profiler, "scan", { self.compactor.compact() });
        let args = IndirectDrawArgs::for_triangles(self.params.draw_mode, total.triangles);
        time_stage!(self.profiler, "emit", {
            emit(
                self.mode,
                &self.volume,
                &self.compactor,
                self.params.frame(),
                iso,
                args,
                &mut self.mesh,
            );
        });

        debug!(
            vertices = total.vertices,
            triangles = total.triangles,
            index_count_per_instance = args.index_count_per_instance,
            instance_count = args.instance_count,
            "terrain extracted"
        );
        Ok(&self.mesh)
    }

    #[inline]
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    #[inline]
    pub fn mesh(&self) -> &TerrainMesh {
        &self.mesh
    }

    #[inline]
    pub fn volume(&self) -> &DensityVolume {
        &self.volume
    }

    #[inline]
    pub fn compactor(&self) -> &CellCompactor {
        &self.compactor
    }

    #[inline]
    pub fn profiler(&self) -> &PassProfiler {
        &self.profiler
    }

    #[inline]
    pub fn profiler_mut(&mut self) -> &mut PassProfiler {
        &mut self.profiler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;

    fn params(chunk_size: u32, draw_mode: DrawMode) -> TerrainParams {
        TerrainParams {
            chunk_size,
            iso_level: 0.5,
            draw_mode,
            ..TerrainParams::default()
        }
    }

    #[test]
    fn test_empty_chunk_draws_nothing() {
        let mut extractor =
            TerrainExtractor::new(params(16, DrawMode::ProxyInstanced), DispatchMode::Parallel)
                .unwrap();
        let mesh = extractor.extract(&|_: Vec3| -1.0).unwrap();
        assert_eq!(mesh.args().instance_count, 0);
        assert!(mesh.vertices().is_empty());
        assert!(mesh.indices().is_empty());
    }

    #[test]
    fn test_single_cell_with_five_triangles() {
        // With a chunk of two only cell (0,0,0) is not phantom.
        let case = 61u8;
        assert_eq!(tables::triangle_count(case), 5);
        let mut values = vec![0.0f32; 27];
        for (corner, offset) in tables::CORNER_OFFSETS.iter().enumerate() {
            if case & (1 << corner) != 0 {
                let p: UVec3 = *offset;
                values[(p.x + 3 * (p.y + 3 * p.z)) as usize] = 1.0;
            }
        }
        let volume = DensityVolume::from_values(3, values).unwrap();

        for mode in [DrawMode::ProxyInstanced, DrawMode::Indexed] {
            let mut extractor =
                TerrainExtractor::new(params(2, mode), DispatchMode::Sequential).unwrap();
            let mesh = extractor.extract_volume(volume.clone()).unwrap();
            assert_eq!(mesh.indices().len(), 15);
            assert_eq!(mesh.args().total_indices(), 15);
            for &i in mesh.indices() {
                assert!((i as usize) < mesh.vertices().len());
            }
        }
        let mut extractor =
            TerrainExtractor::new(params(2, DrawMode::ProxyInstanced), DispatchMode::Sequential)
                .unwrap();
        let args = extractor.extract_volume(volume).unwrap().args();
        assert_eq!((args.index_count_per_instance, args.instance_count), (3, 5));
    }

    #[test]
    fn test_configured_field_produces_surface() {
        let mut extractor =
            TerrainExtractor::new(TerrainParams::default(), DispatchMode::Parallel).unwrap();
        let mesh = extractor.extract_configured().unwrap();
        assert!(mesh.triangle_count() > 0);
        assert_eq!(mesh.args().instance_count as usize, mesh.triangle_count());
        assert!(mesh.vertices().len() <= mesh.vertex_capacity());
        assert!(mesh.indices().len() <= mesh.index_capacity());
    }

    #[test]
    fn test_mismatched_volume_is_an_error() {
        let mut extractor =
            TerrainExtractor::new(params(8, DrawMode::Indexed), DispatchMode::Parallel).unwrap();
        let small = DensityVolume::from_values(4, vec![1.0; 64]).unwrap();
        assert!(matches!(
            extractor.extract_volume(small),
            Err(SetupError::LatticeSize { expected: 9, actual: 4 })
        ));
        // The extractor is still usable afterwards.
        assert!(extractor.extract(&|_: Vec3| -1.0).is_ok());
    }

    #[test]
    fn test_rejects_bad_setup() {
        let oversized = params(200, DrawMode::Indexed);
        assert!(TerrainExtractor::new(oversized, DispatchMode::Parallel).is_err());
        let bad_voxel = TerrainParams {
            voxel_size: 0.0,
            ..TerrainParams::default()
        };
        assert!(matches!(
            TerrainExtractor::new(bad_voxel, DispatchMode::Parallel),
            Err(SetupError::InvalidCellSize { .. })
        ));
    }
}
