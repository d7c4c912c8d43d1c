//! gridsort GPU backend
//!
//! The same block kernels as the CPU reference device, written in WGSL and
//! dispatched through wgpu. Results are read back to the host so the two
//! devices can be compared.

pub mod backend;
pub mod boid_grid;
pub mod compactor;
pub mod context;
pub mod error;
mod kernels;
pub mod scan;
pub mod shaders;

pub use wgpu;

pub use boid_grid::{GpuBoidGrid, GpuSortOutput};
pub use compactor::{GpuCellCompactor, GpuCompaction};
pub use context::GpuContext;
pub use error::GpuError;
pub use scan::GpuScan;

/// Threads per workgroup for every one-element-per-thread kernel.
pub const WORKGROUP_SIZE: u32 = 256;

/// Graphics API the adapter runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Metal (macOS, iOS)
    Metal,
    /// DirectX 12 (Windows)
    DirectX12,
    /// Vulkan (cross-platform)
    Vulkan,
    /// OpenGL / GLES
    OpenGL,
    /// WebGPU in a browser
    WebGpu,
    /// No real backend
    Empty,
}

/// Capability probe result
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    pub backend: BackendType,
    pub adapter_name: String,
    pub max_workgroup_size_x: u32,
    pub max_workgroups_per_dimension: u32,
    pub max_storage_buffer_binding_size: u32,
    pub max_workgroup_storage_size: u32,
}
