//! Marching-cubes compaction on the device
//!
//! Mark, scan the `(vertices, triangles)` pairs, then write the indirect
//! draw arguments straight from the scanned total. The args buffer can be
//! handed to `draw_indexed_indirect` without a host round trip.

use crate::context::GpuContext;
use crate::error::GpuError;
use crate::kernels::{
    clear_kernel, init_buffer, read_buffer, shader_module, storage_buffer, storage_entry,
    uniform_buffer, uniform_entry, workgroups_for, Kernel,
};
use crate::scan::GpuScan;
use crate::shaders::{ScanKind, MARK_CELLS, WRITE_ARGS};
use crate::WORKGROUP_SIZE;
use bytemuck::{Pod, Zeroable};
use gridsort_core::device::round_up_to_block;
use gridsort_core::terrain::{tables, CellCounts, DensityVolume, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use gridsort_core::{DrawMode, IndirectDrawArgs, SetupError};
use tracing::debug;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ChunkParams {
    chunk_size: u32,
    cell_count: u32,
    iso_level: f32,
    draw_mode: u32,
}

fn draw_mode_code(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::ProxyInstanced => 0,
        DrawMode::Indexed => 1,
    }
}

/// Host copy of one device compaction.
#[derive(Debug, Clone)]
pub struct GpuCompaction {
    /// Exclusive per-cell offsets.
    pub offsets: Vec<CellCounts>,
    pub cell_data: Vec<u32>,
    pub total: CellCounts,
    pub args: IndirectDrawArgs,
}

pub struct GpuCellCompactor {
    chunk_size: u32,
    cell_count: usize,
    _params: wgpu::Buffer,
    density: wgpu::Buffer,
    counts: wgpu::Buffer,
    cell_data: wgpu::Buffer,
    args: wgpu::Buffer,
    clear: Kernel,
    clear_group: wgpu::BindGroup,
    mark: Kernel,
    mark_group: wgpu::BindGroup,
    write_args: Kernel,
    write_args_group: wgpu::BindGroup,
    scan: GpuScan,
    // Kept alive for the mark bind group.
    _triangle_counts: wgpu::Buffer,
}

impl GpuCellCompactor {
    pub fn new(
        ctx: &GpuContext,
        chunk_size: u32,
        iso_level: f32,
        draw_mode: DrawMode,
    ) -> Result<Self, GpuError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(SetupError::ChunkSize {
                chunk_size,
                min: MIN_CHUNK_SIZE,
                max: MAX_CHUNK_SIZE,
            }
            .into());
        }
        ctx.validated("cell compactor setup", || {
            Self::build(ctx, chunk_size, iso_level, draw_mode)
        })
    }

    fn build(
        ctx: &GpuContext,
        chunk_size: u32,
        iso_level: f32,
        draw_mode: DrawMode,
    ) -> Result<Self, GpuError> {
        let device = &ctx.device;
        let cell_count = (chunk_size as usize).pow(3);
        let capacity = round_up_to_block(cell_count);
        let lattice = (chunk_size as usize + 1).pow(3);

        let params = uniform_buffer(
            device,
            "chunk params",
            &ChunkParams {
                chunk_size,
                cell_count: cell_count as u32,
                iso_level,
                draw_mode: draw_mode_code(draw_mode),
            },
        );
        let no_usage = wgpu::BufferUsages::empty();
        let density = storage_buffer(device, "density lattice", lattice, 4, no_usage);
        let triangle_counts: Vec<u32> =
            tables::triangle_counts().iter().map(|&c| u32::from(c)).collect();
        let triangle_counts = init_buffer(device, "triangle counts", &triangle_counts);
        let counts = storage_buffer(device, "cell counts", capacity, 8, no_usage);
        let cell_data = storage_buffer(device, "cell data", cell_count, 4, no_usage);
        let args = storage_buffer(
            device,
            "indirect draw args",
            1,
            std::mem::size_of::<IndirectDrawArgs>() as u64,
            wgpu::BufferUsages::INDIRECT,
        );

        let clear = clear_kernel(device);
        let clear_group = clear.bind(device, "clear counts", &[&counts]);

        let mark_module = shader_module(device, "mark cells", MARK_CELLS);
        let mark = Kernel::new(
            device,
            "mark cells",
            &mark_module,
            "main",
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
            ],
        );
        let mark_group = mark.bind(
            device,
            "mark cells",
            &[&params, &density, &triangle_counts, &counts, &cell_data],
        );

        let scan = GpuScan::new(ctx, ScanKind::Pairs, &counts, capacity)?;

        let args_module = shader_module(device, "write args", WRITE_ARGS);
        let write_args = Kernel::new(
            device,
            "write args",
            &args_module,
            "main",
            &[uniform_entry(0), storage_entry(1, true), storage_entry(2, false)],
        );
        let write_args_group =
            write_args.bind(device, "write args", &[&params, scan.total_buffer(), &args]);

        debug!(chunk_size, cells = cell_count, capacity, "device compactor ready");
        Ok(Self {
            chunk_size,
            cell_count,
            _params: params,
            density,
            counts,
            cell_data,
            args,
            clear,
            clear_group,
            mark,
            mark_group,
            write_args,
            write_args_group,
            scan,
            _triangle_counts: triangle_counts,
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

    /// Five `u32` words in indexed-indirect order, written on the device.
    #[inline]
    pub fn args_buffer(&self) -> &wgpu::Buffer {
        &self.args
    }

    /// Upload the lattice, record mark, scan and args, and submit.
    pub fn submit(&self, ctx: &GpuContext, volume: &DensityVolume) -> Result<(), GpuError> {
        if volume.dim() != self.chunk_size + 1 {
            return Err(SetupError::LatticeSize {
                expected: self.chunk_size + 1,
                actual: volume.dim(),
            }
            .into());
        }
        ctx.queue.write_buffer(&self.density, 0, bytemuck::cast_slice(volume.values()));

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("cell compaction"),
        });
        // Pairs are cleared as twice as many words.
        let words = 2 * self.scan.block_count() * gridsort_core::BLOCK_SIZE;
        let word_groups = workgroups_for(words, WORKGROUP_SIZE);
        let cell_groups = workgroups_for(self.cell_count, WORKGROUP_SIZE);
        self.clear.dispatch(&mut encoder, "clear", &self.clear_group, word_groups);
        self.mark.dispatch(&mut encoder, "mark", &self.mark_group, cell_groups);
        self.scan.encode(&mut encoder);
        self.write_args.dispatch(&mut encoder, "write args", &self.write_args_group, 1);
        ctx.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Compact on the device and read everything back.
    pub fn compact(
        &self,
        ctx: &GpuContext,
        volume: &DensityVolume,
    ) -> Result<GpuCompaction, GpuError> {
        self.submit(ctx, volume)?;
        let offsets = read_buffer(ctx, &self.counts, self.cell_count)?;
        let cell_data = read_buffer(ctx, &self.cell_data, self.cell_count)?;
        let total = read_buffer::<CellCounts>(ctx, self.scan.total_buffer(), 1)?
            .first()
            .copied()
            .unwrap_or_default();
        let args = read_buffer::<IndirectDrawArgs>(ctx, &self.args, 1)?
            .first()
            .copied()
            .unwrap_or_default();
        debug!(
            vertices = total.vertices,
            triangles = total.triangles,
            instance_count = args.instance_count,
            "device compaction read back"
        );
        Ok(GpuCompaction {
            offsets,
            cell_data,
            total,
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_params_layout() {
        assert_eq!(std::mem::size_of::<ChunkParams>(), 16);
        assert_eq!(std::mem::size_of::<IndirectDrawArgs>(), 20);
    }

    #[test]
    fn test_draw_mode_codes_match_shader() {
        assert_eq!(draw_mode_code(DrawMode::ProxyInstanced), 0);
        assert_eq!(draw_mode_code(DrawMode::Indexed), 1);
    }
}
