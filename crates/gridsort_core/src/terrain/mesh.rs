//! Geometry emission at compacted offsets
//!
//! After the scan every cell knows where its vertices and indices go.
//! A cell writes the vertices of the edges it owns, then resolves each
//! triangle corner to the vertex written by that edge's owner.

use super::compaction::{cell_case, cell_edge_mask, CellCompactor};
use super::density::DensityVolume;
use super::tables::{triangle_count, CORNER_OFFSETS, EDGE_OWNERS, SLOT_CORNERS, TRI_TABLE};
use crate::device::{block_count, dispatch_blocks, DispatchMode, ScatterTarget, LANES_PER_BLOCK};
use crate::indirect::IndirectDrawArgs;
use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec3, Vec4};

/// Vertex as stored in the device vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: Vec4,
    pub normal: Vec4,
}

/// Where lattice point `p` sits in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeFrame {
    pub origin: Vec3,
    pub spacing: f32,
}

impl LatticeFrame {
    #[inline]
    pub fn world(&self, p: Vec3) -> Vec3 {
        self.origin + p * self.spacing
    }
}

/// Worst-case vertex and index buffers for one chunk.
#[derive(Debug, Clone)]
pub struct TerrainMesh {
    vertices: Box<[TerrainVertex]>,
    indices: Box<[u32]>,
    vertex_count: usize,
    index_count: usize,
    args: IndirectDrawArgs,
}

impl TerrainMesh {
    /// Three owned edges and five triangles per cell at most.
    pub fn with_cell_capacity(cells: usize) -> Self {
        Self {
            vertices: vec![TerrainVertex::default(); 3 * cells].into_boxed_slice(),
            indices: vec![0; 15 * cells].into_boxed_slice(),
            vertex_count: 0,
            index_count: 0,
            args: IndirectDrawArgs::default(),
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices[..self.vertex_count]
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices[..self.index_count]
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.index_count / 3
    }

    #[inline]
    pub fn args(&self) -> IndirectDrawArgs {
        self.args
    }

    #[inline]
    pub fn vertex_capacity(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_capacity(&self) -> usize {
        self.indices.len()
    }
}

fn edge_vertex(
    volume: &DensityVolume,
    frame: LatticeFrame,
    a: UVec3,
    b: UVec3,
    iso_level: f32,
) -> TerrainVertex {
    let (da, db) = (volume.get(a), volume.get(b));
    let t = ((iso_level - da) / (db - da)).clamp(0.0, 1.0);
    let p = a.as_vec3().lerp(b.as_vec3(), t);
    let gradient = volume.gradient(a).lerp(volume.gradient(b), t);
    TerrainVertex {
        position: frame.world(p).extend(1.0),
        normal: (-gradient).normalize_or_zero().extend(0.0),
    }
}

/// Write vertices, indices and draw args for a compacted chunk.
///
/// `compactor` must have been marked from `volume` and compacted.
pub fn emit(
    mode: DispatchMode,
    volume: &DensityVolume,
    compactor: &CellCompactor,
    frame: LatticeFrame,
    iso_level: f32,
    args: IndirectDrawArgs,
    mesh: &mut TerrainMesh,
) {
    let total = compactor.total();
    let offsets = compactor.counts();
    let data = compactor.cell_data();
    let cells = compactor.cell_count();

    let vertices = ScatterTarget::new(&mut mesh.vertices);
    let indices = ScatterTarget::new(&mut mesh.indices);

    dispatch_blocks(mode, block_count(cells, LANES_PER_BLOCK), |block| {
        let start = block * LANES_PER_BLOCK;
        for index in start..(start + LANES_PER_BLOCK).min(cells) {
            let cell = compactor.cell_coord(index);
            let packed = data[index];
            let base = offsets[index];

            let mask = cell_edge_mask(packed);
            let mut rank = 0;
            for (slot, &far) in SLOT_CORNERS.iter().enumerate() {
                if mask & (1 << slot) != 0 {
                    let end = cell + CORNER_OFFSETS[far];
                    let vertex = edge_vertex(volume, frame, cell, end, iso_level);
                    // SAFETY: the scan gives every cell a disjoint vertex range.
                    unsafe { vertices.write((base.vertices + rank) as usize, vertex) };
                    rank += 1;
                }
            }

            if compactor.is_phantom(cell) {
                continue;
            }
            let case = cell_case(packed);
            let count = triangle_count(case) as usize;
            let row = &TRI_TABLE[case as usize];
            for (corner, &edge) in row[..3 * count].iter().enumerate() {
                let (offset, slot) = EDGE_OWNERS[edge as usize];
                let owner = compactor.cell_index(cell + offset);
                let owner_mask = cell_edge_mask(data[owner]);
                let owner_rank = (owner_mask & ((1 << slot) - 1)).count_ones();
                let vertex = offsets[owner].vertices + owner_rank;
                // SAFETY: the scan gives every cell a disjoint index range.
                unsafe { indices.write(3 * base.triangles as usize + corner, vertex) };
            }
        }
    });

    mesh.vertex_count = total.vertices as usize;
    mesh.index_count = 3 * total.triangles as usize;
    mesh.args = args;
}
