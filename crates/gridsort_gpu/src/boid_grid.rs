//! Boid grid sort on the device
//!
//! Clear, count, scan and scatter as one command buffer. The sorted flock,
//! the bucket offsets and the total are read back for the host.

use crate::context::GpuContext;
use crate::error::GpuError;
use crate::kernels::{
    clear_kernel, read_buffer, shader_module, storage_buffer, storage_entry, uniform_buffer,
    uniform_entry, workgroups_for, Kernel,
};
use crate::scan::GpuScan;
use crate::shaders::{ScanKind, COUNT_BOIDS, SCATTER_BOIDS};
use crate::WORKGROUP_SIZE;
use bytemuck::{Pod, Zeroable};
use gridsort_core::boids::Boid;
use gridsort_core::{GridEntry, GridLayout, SetupError};
use tracing::debug;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GridParams {
    origin: [f32; 3],
    cell_size: f32,
    dims: [u32; 3],
    item_count: u32,
}

impl GridParams {
    fn new(grid: &GridLayout, item_count: u32) -> Self {
        Self {
            origin: grid.origin().to_array(),
            cell_size: grid.cell_size(),
            dims: grid.dims().to_array(),
            item_count,
        }
    }
}

/// Host copy of one device sort.
#[derive(Debug, Clone)]
pub struct GpuSortOutput {
    pub sorted: Vec<Boid>,
    /// Exclusive bucket offsets, one per bucket of the padded capacity.
    pub offsets: Vec<u32>,
    pub total: u32,
}

pub struct GpuBoidGrid {
    grid: GridLayout,
    capacity: usize,
    params: wgpu::Buffer,
    boids_in: wgpu::Buffer,
    boids_out: wgpu::Buffer,
    offsets: wgpu::Buffer,
    clear: Kernel,
    clear_group: wgpu::BindGroup,
    count: Kernel,
    count_group: wgpu::BindGroup,
    scatter: Kernel,
    scatter_group: wgpu::BindGroup,
    scan: GpuScan,
}

impl GpuBoidGrid {
    /// Allocate every buffer for up to `capacity` boids.
    pub fn new(ctx: &GpuContext, grid: GridLayout, capacity: usize) -> Result<Self, GpuError> {
        ctx.check_dispatch(u64::from(workgroups_for(capacity, WORKGROUP_SIZE)))?;
        ctx.validated("boid grid setup", || Self::build(ctx, grid, capacity))
    }

    fn build(ctx: &GpuContext, grid: GridLayout, capacity: usize) -> Result<Self, GpuError> {
        let device = &ctx.device;
        let buckets = grid.bucket_capacity();
        let boid_size = std::mem::size_of::<Boid>() as u64;

        let params = uniform_buffer(device, "grid params", &GridParams::new(&grid, 0));
        let no_usage = wgpu::BufferUsages::empty();
        let boids_in = storage_buffer(device, "boids in", capacity, boid_size, no_usage);
        let boids_out = storage_buffer(device, "boids out", capacity, boid_size, no_usage);
        let entries = storage_buffer(
            device,
            "grid entries",
            capacity,
            std::mem::size_of::<GridEntry>() as u64,
            no_usage,
        );
        let offsets = storage_buffer(device, "bucket offsets", buckets, 4, no_usage);

        let clear = clear_kernel(device);
        let clear_group = clear.bind(device, "clear offsets", &[&offsets]);

        let count_module = shader_module(device, "count boids", COUNT_BOIDS);
        let count = Kernel::new(
            device,
            "count boids",
            &count_module,
            "main",
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, false),
                storage_entry(3, false),
            ],
        );
        let count_group =
            count.bind(device, "count boids", &[&params, &boids_in, &offsets, &entries]);

        let scatter_module = shader_module(device, "scatter boids", SCATTER_BOIDS);
        let scatter = Kernel::new(
            device,
            "scatter boids",
            &scatter_module,
            "main",
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, false),
            ],
        );
        let scatter_group = scatter.bind(
            device,
            "scatter boids",
            &[&params, &boids_in, &entries, &offsets, &boids_out],
        );

        let scan = GpuScan::new(ctx, ScanKind::Counters, &offsets, buckets)?;

        debug!(buckets, capacity, "device boid grid ready");
        Ok(Self {
            grid,
            capacity,
            params,
            boids_in,
            boids_out,
            offsets,
            clear,
            clear_group,
            count,
            count_group,
            scatter,
            scatter_group,
            scan,
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

    /// Sorted flock on the device after the last [`GpuBoidGrid::sort`].
    #[inline]
    pub fn sorted_buffer(&self) -> &wgpu::Buffer {
        &self.boids_out
    }

    /// Upload `boids`, record the sort and submit it. Does not wait.
    pub fn submit(&self, ctx: &GpuContext, boids: &[Boid]) -> Result<(), GpuError> {
        if boids.len() > self.capacity {
            return Err(SetupError::CapacityExceeded {
                requested: boids.len(),
                capacity: self.capacity,
            }
            .into());
        }
        let n = boids.len();
        let params = GridParams::new(&self.grid, n as u32);
        ctx.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
        if n > 0 {
            ctx.queue.write_buffer(&self.boids_in, 0, bytemuck::cast_slice(boids));
        }

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("boid grid sort"),
        });
        let bucket_groups = workgroups_for(self.grid.bucket_capacity(), WORKGROUP_SIZE);
        let boid_groups = workgroups_for(n, WORKGROUP_SIZE);
        self.clear.dispatch(&mut encoder, "clear", &self.clear_group, bucket_groups);
        self.count.dispatch(&mut encoder, "count", &self.count_group, boid_groups);
        self.scan.encode(&mut encoder);
        self.scatter.dispatch(&mut encoder, "scatter", &self.scatter_group, boid_groups);
        ctx.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Sort on the device and read the results back.
    pub fn sort(&self, ctx: &GpuContext, boids: &[Boid]) -> Result<GpuSortOutput, GpuError> {
        self.submit(ctx, boids)?;
        let sorted = read_buffer(ctx, &self.boids_out, boids.len())?;
        let offsets = read_buffer(ctx, &self.offsets, self.grid.bucket_capacity())?;
        let total = read_buffer::<u32>(ctx, self.scan.total_buffer(), 1)?
            .first()
            .copied()
            .unwrap_or_default();
        debug!(boids = boids.len(), total, "device sort read back");
        Ok(GpuSortOutput { sorted, offsets, total })
    }
}
