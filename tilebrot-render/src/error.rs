use std::collections::TryReserveError;

use thiserror::Error;

/// Errors originating from the compute engine and its output stages.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to allocate frame buffers for {width}×{height}")]
    Allocation {
        width: u32,
        height: u32,
        #[source]
        source: TryReserveError,
    },

    #[error("invalid engine config: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("PNG encoding failed: {0}")]
    Export(#[from] png::EncodingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] tilebrot_core::CoreError),
}
