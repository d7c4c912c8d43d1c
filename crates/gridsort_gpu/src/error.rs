use gridsort_core::SetupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to map buffer for readback: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),
    #[error("readback channel closed before the buffer was mapped")]
    MapChannelClosed,
    #[error("{workgroups} workgroups exceed the per-dimension limit of {limit}")]
    DispatchTooLarge { workgroups: u64, limit: u32 },
    #[error("device rejected {stage}: {message}")]
    Validation { stage: &'static str, message: String },
    #[error(transparent)]
    Setup(#[from] SetupError),
}
