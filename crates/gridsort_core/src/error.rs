// error.rs - setup-time validation failures

use thiserror::Error;

/// Everything that can go wrong before a pass is dispatched.
///
/// Kernels never signal errors: buffers are sized and validated here, once,
/// and a pass that passes validation always runs to completion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetupError {
    #[error("{requested} buckets exceed the two-level scan ceiling of {max}")]
    TooManyBuckets { requested: u128, max: usize },

    #[error("grid dimensions {dims:?} must all be non-zero")]
    EmptyGrid { dims: [u32; 3] },

    #[error("cell size must be finite and positive, got {cell_size}")]
    InvalidCellSize { cell_size: f32 },

    #[error("{requested} items exceed the allocated capacity of {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },

    #[error("output holds {output} items but the pass sorts {input}")]
    OutputMismatch { input: usize, output: usize },

    #[error("density lattice has {actual} samples per axis, expected {expected}")]
    LatticeSize { expected: u32, actual: u32 },

    #[error("chunk size {chunk_size} is outside the supported range {min}..={max}")]
    ChunkSize { chunk_size: u32, min: u32, max: u32 },
}
