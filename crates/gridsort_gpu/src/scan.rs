//! Device hierarchical scan
//!
//! Three passes over a values buffer owned by the caller: scan each block
//! and record its sum, scan the block sums in a single workgroup writing
//! the grand total, then add each block's offset back.

use crate::context::GpuContext;
use crate::error::GpuError;
use crate::kernels::{shader_module, storage_buffer, storage_entry, Kernel};
use crate::shaders::{scan_source, ScanKind};
use gridsort_core::device::{block_count, MAX_SCAN_BLOCKS};
use gridsort_core::{SetupError, BLOCK_SIZE, MAX_BUCKETS};

pub struct GpuScan {
    kind: ScanKind,
    blocks: usize,
    scan_blocks: Kernel,
    scan_block_sums: Kernel,
    add_block_sums: Kernel,
    bind_group: wgpu::BindGroup,
    block_sums: wgpu::Buffer,
    total: wgpu::Buffer,
}

impl GpuScan {
    /// `values` must hold `capacity` elements, a whole number of blocks.
    pub fn new(
        ctx: &GpuContext,
        kind: ScanKind,
        values: &wgpu::Buffer,
        capacity: usize,
    ) -> Result<Self, GpuError> {
        if capacity > MAX_BUCKETS {
            return Err(SetupError::TooManyBuckets {
                requested: capacity as u128,
                max: MAX_BUCKETS,
            }
            .into());
        }
        debug_assert_eq!(capacity % BLOCK_SIZE, 0);
        let device = &ctx.device;
        let module = shader_module(device, kind.label(), &scan_source(kind));

        // Identical layouts are group-equivalent, so one bind group serves all three.
        let entries = [storage_entry(0, false), storage_entry(1, false), storage_entry(2, false)];
        let scan_blocks = Kernel::new(device, "scan blocks", &module, "scan_blocks", &entries);
        let scan_block_sums =
            Kernel::new(device, "scan block sums", &module, "scan_block_sums", &entries);
        let add_block_sums =
            Kernel::new(device, "add block sums", &module, "add_block_sums", &entries);

        let size = kind.element_size();
        let no_usage = wgpu::BufferUsages::empty();
        let block_sums =
            storage_buffer(device, "scan block sums", MAX_SCAN_BLOCKS, size, no_usage);
        let total = storage_buffer(device, "scan total", 1, size, no_usage);
        let bind_group = scan_blocks.bind(device, kind.label(), &[values, &block_sums, &total]);

        Ok(Self {
            kind,
            blocks: block_count(capacity, BLOCK_SIZE),
            scan_blocks,
            scan_block_sums,
            add_block_sums,
            bind_group,
            block_sums,
            total,
        })
    }

    #[inline]
    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks
    }

    /// One element holding the grand total after [`GpuScan::encode`].
    #[inline]
    pub fn total_buffer(&self) -> &wgpu::Buffer {
        &self.total
    }

    /// Record the three passes. Block sums are cleared first so unused
    /// entries never leak into the second stage.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.block_sums, 0, None);
        self.scan_blocks.dispatch(encoder, "scan blocks", &self.bind_group, self.blocks as u32);
        self.scan_block_sums.dispatch(encoder, "scan block sums", &self.bind_group, 1);
        if self.blocks > 1 {
            self.add_block_sums
                .dispatch(encoder, "add block sums", &self.bind_group, self.blocks as u32 - 1);
        }
    }
}
