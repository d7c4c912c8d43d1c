//! Headless device setup

use crate::backend::probe_capabilities;
use crate::error::GpuError;
use crate::DeviceCapabilities;
use tracing::{info, warn};

/// Adapter, device and queue for compute-only work.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    capabilities: DeviceCapabilities,
}

impl GpuContext {
    /// Request a high-performance adapter without a surface.
    pub fn new_headless() -> Result<Self, GpuError> {
        pollster::block_on(Self::request())
    }

    async fn request() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gridsort device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let capabilities = probe_capabilities(&adapter);
        info!(
            adapter = %capabilities.adapter_name,
            backend = ?capabilities.backend,
            max_storage_binding = capabilities.max_storage_buffer_binding_size,
            "GPU context ready"
        );

        Ok(Self {
            adapter,
            device,
            queue,
            capabilities,
        })
    }

    #[inline]
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Run `f` inside a validation error scope, so a rejected pipeline or
    /// bind group comes back as [`GpuError::Validation`] instead of reaching
    /// the uncaptured-error handler.
    pub fn validated<T>(
        &self,
        stage: &'static str,
        f: impl FnOnce() -> Result<T, GpuError>,
    ) -> Result<T, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = f();
        let rejected = pollster::block_on(self.device.pop_error_scope());
        let value = result?;
        match rejected {
            Some(error) => {
                warn!(stage, error = %error, "device validation failed");
                Err(GpuError::Validation {
                    stage,
                    message: error.to_string(),
                })
            }
            None => Ok(value),
        }
    }

    /// Fail setup when a one-dimensional dispatch would exceed the device limit.
    pub fn check_dispatch(&self, workgroups: u64) -> Result<(), GpuError> {
        let limit = self.capabilities.max_workgroups_per_dimension;
        if workgroups > u64::from(limit) {
            return Err(GpuError::DispatchTooLarge { workgroups, limit });
        }
        Ok(())
    }
}
