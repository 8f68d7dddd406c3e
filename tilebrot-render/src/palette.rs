use rayon::prelude::*;

use crate::buffer::RenderBuffer;
use crate::store::FrameSnapshot;

/// Maps normalized palette buckets to shades of gray.
///
/// Bucket `b` of a `C`-entry palette becomes level `b·255 / C`, so bucket 0
/// is black and the top bucket stays just short of white.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrayscalePalette {
    size: u32,
}

impl GrayscalePalette {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// RGBA color of one bucket. Out-of-range buckets clamp to the top entry.
    #[inline]
    pub fn color(&self, bucket: u32) -> [u8; 4] {
        let b = bucket.min(self.size - 1);
        let level = (u64::from(b) * 255 / u64::from(self.size)) as u8;
        [level, level, level, 255]
    }

    /// Colorize a snapshot through its own normalization map.
    ///
    /// Values missing from the map (the grid was read before any pixel of
    /// that value was counted) fall back to bucket 0.
    pub fn colorize(&self, snapshot: &FrameSnapshot) -> RenderBuffer {
        let map = &snapshot.normalization;
        let mut out = RenderBuffer::new(snapshot.width, snapshot.height);
        out.pixels
            .par_chunks_mut(4)
            .zip(snapshot.iterations.par_iter())
            .for_each(|(pixel, &value)| {
                let c = self.color(map.bucket(value).unwrap_or(0));
                pixel.copy_from_slice(&c);
            });
        out
    }
}

impl Default for GrayscalePalette {
    fn default() -> Self {
        Self::new(crate::config::EngineConfig::DEFAULT_COLOR_BUCKETS)
    }
}
