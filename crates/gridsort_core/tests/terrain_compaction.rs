//! Property-based tests for active-cell compaction
//!
//! Random density lattices must always produce in-bounds geometry whose
//! size matches the per-cell case table and whose draw arguments agree.

use gridsort_core::glam::UVec3;
use gridsort_core::terrain::{tables, DensityVolume, TerrainExtractor, TerrainParams};
use gridsort_core::{DispatchMode, DrawMode};
use proptest::prelude::*;

const CHUNK: u32 = 5;
const LATTICE: usize = (CHUNK as usize + 1).pow(3);

fn lattice() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1.0f32..1.0, LATTICE..=LATTICE)
}

fn expected_triangles(values: &[f32], iso: f32) -> u32 {
    let dim = CHUNK + 1;
    let mut triangles = 0;
    for z in 0..CHUNK - 1 {
        for y in 0..CHUNK - 1 {
            for x in 0..CHUNK - 1 {
                let cell = UVec3::new(x, y, z);
                let corners = tables::CORNER_OFFSETS.map(|o| {
                    let p = cell + o;
                    values[(p.x + dim * (p.y + dim * p.z)) as usize]
                });
                triangles += tables::triangle_count(tables::case_index(&corners, iso));
            }
        }
    }
    triangles
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_random_lattice_geometry(values in lattice(), indexed in any::<bool>()) {
        let draw_mode = if indexed { DrawMode::Indexed } else { DrawMode::ProxyInstanced };
        let params = TerrainParams {
            chunk_size: CHUNK,
            iso_level: 0.0,
            draw_mode,
            ..TerrainParams::default()
        };
        let mut extractor = TerrainExtractor::new(params, DispatchMode::Parallel).unwrap();
        let expected = expected_triangles(&values, 0.0);
        let volume = DensityVolume::from_values(CHUNK + 1, values).unwrap();
        let mesh = extractor.extract_volume(volume).unwrap();

        prop_assert_eq!(mesh.triangle_count() as u32, expected);
        prop_assert_eq!(mesh.args().total_indices(), 3 * expected);
        for &index in mesh.indices() {
            prop_assert!((index as usize) < mesh.vertices().len());
        }
        for tri in mesh.indices().chunks_exact(3) {
            prop_assert!(tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2]);
        }
    }
}
