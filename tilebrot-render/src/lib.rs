pub mod buffer;
pub mod coarse;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod normalize;
pub mod palette;
pub mod scheduler;
pub mod store;
pub mod tile;

pub use buffer::RenderBuffer;
pub use coarse::{coarse_pass, CoarseFill};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::RenderError;
pub use export::{export_png, ExportMetadata};
pub use normalize::{normalize, Histogram, NormalizationMap};
pub use palette::GrayscalePalette;
pub use scheduler::TileScheduler;
pub use store::{EngineEvent, FrameBuffers, FrameComplete, FrameSnapshot, ResultStore, Retired};
pub use tile::{build_tile_grid, TileJob, TileRect};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
