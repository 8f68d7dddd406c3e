use thiserror::Error;

/// Errors originating from the core math crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("invalid viewport: {reason}")]
    InvalidViewport { reason: String },

    #[error("invalid pixel grid: {width}×{height} (both sides must be > 0)")]
    InvalidDimensions { width: u32, height: u32 },
}
