//! Adapter capability probing

use crate::{BackendType, DeviceCapabilities};

impl From<wgpu::Backend> for BackendType {
    fn from(backend: wgpu::Backend) -> Self {
        match backend {
            wgpu::Backend::Metal => Self::Metal,
            wgpu::Backend::Dx12 => Self::DirectX12,
            wgpu::Backend::Vulkan => Self::Vulkan,
            wgpu::Backend::Gl => Self::OpenGL,
            wgpu::Backend::BrowserWebGpu => Self::WebGpu,
            wgpu::Backend::Empty => Self::Empty,
        }
    }
}

/// Read the limits the kernels depend on.
pub fn probe_capabilities(adapter: &wgpu::Adapter) -> DeviceCapabilities {
    let info = adapter.get_info();
    let limits = adapter.limits();
    DeviceCapabilities {
        backend: info.backend.into(),
        adapter_name: info.name,
        max_workgroup_size_x: limits.max_compute_workgroup_size_x,
        max_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
        max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size,
        max_workgroup_storage_size: limits.max_compute_workgroup_storage_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_mapping() {
        assert_eq!(BackendType::from(wgpu::Backend::Vulkan), BackendType::Vulkan);
        assert_eq!(BackendType::from(wgpu::Backend::Gl), BackendType::OpenGL);
        assert_eq!(BackendType::from(wgpu::Backend::Empty), BackendType::Empty);
    }
}
