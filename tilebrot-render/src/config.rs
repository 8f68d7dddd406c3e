use serde::{Deserialize, Serialize};

use tilebrot_core::Mandelbrot;

use crate::error::RenderError;

/// Tunables for the compute engine.
///
/// Every field falls back to its default when missing from a config file, so
/// a partial JSON object such as `{"max_iterations": 800}` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Iteration cap handed to the Mandelbrot evaluator.
    pub max_iterations: u32,
    /// Size of the bounded palette the normalizer maps onto.
    pub color_buckets: u32,
    /// The frame is split into `tiles_per_side²` jobs.
    pub tiles_per_side: u32,
    /// Nominal coarse-pass block size in pixels.
    pub coarse_block_width: u32,
    pub coarse_block_height: u32,
    /// Worker pool size. `None` uses the available parallelism.
    pub worker_threads: Option<usize>,
}

impl EngineConfig {
    pub const DEFAULT_MAX_ITERATIONS: u32 = Mandelbrot::DEFAULT_MAX_ITERATIONS;
    pub const DEFAULT_COLOR_BUCKETS: u32 = 150;
    pub const DEFAULT_TILES_PER_SIDE: u32 = 16;
    pub const DEFAULT_COARSE_BLOCK: (u32, u32) = (16, 9);

    pub fn validate(&self) -> crate::Result<()> {
        let fields = [
            ("max_iterations", self.max_iterations),
            ("color_buckets", self.color_buckets),
            ("tiles_per_side", self.tiles_per_side),
            ("coarse_block_width", self.coarse_block_width),
            ("coarse_block_height", self.coarse_block_height),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| *v == 0) {
            return Err(RenderError::InvalidConfig {
                reason: format!("{name} must be >= 1"),
            });
        }
        if self.worker_threads == Some(0) {
            return Err(RenderError::InvalidConfig {
                reason: "worker_threads must be >= 1 when set".into(),
            });
        }
        Ok(())
    }

    /// Total number of tile jobs per epoch.
    pub fn tile_count(&self) -> usize {
        self.tiles_per_side as usize * self.tiles_per_side as usize
    }

    /// The evaluator these settings describe.
    pub fn mandelbrot(&self) -> crate::Result<Mandelbrot> {
        Ok(Mandelbrot::new(self.max_iterations)?)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            color_buckets: Self::DEFAULT_COLOR_BUCKETS,
            tiles_per_side: Self::DEFAULT_TILES_PER_SIDE,
            coarse_block_width: Self::DEFAULT_COARSE_BLOCK.0,
            coarse_block_height: Self::DEFAULT_COARSE_BLOCK.1,
            worker_threads: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.max_iterations, 5000);
        assert_eq!(c.color_buckets, 150);
        assert_eq!(c.tile_count(), 256);
        assert_eq!((c.coarse_block_width, c.coarse_block_height), (16, 9));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: EngineConfig =
            serde_json::from_str(r#"{"max_iterations": 800, "worker_threads": 3}"#).unwrap();
        assert_eq!(c.max_iterations, 800);
        assert_eq!(c.worker_threads, Some(3));
        assert_eq!(c.color_buckets, 150);
    }

    #[test]
    fn zero_fields_rejected() {
        let c = EngineConfig {
            tiles_per_side: 0,
            ..EngineConfig::default()
        };
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("tiles_per_side"), "{err}");

        let c = EngineConfig {
            worker_threads: Some(0),
            ..EngineConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn builds_evaluator() {
        use tilebrot_core::Fractal;
        let c = EngineConfig {
            max_iterations: 42,
            ..EngineConfig::default()
        };
        assert_eq!(c.mandelbrot().unwrap().max_iterations(), 42);
    }
}
