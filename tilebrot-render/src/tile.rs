use tilebrot_core::Frame;

/// A rectangular region of the raster, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    /// Pixel x of the top-left corner.
    pub x: u32,
    /// Pixel y of the top-left corner.
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    /// Number of pixels in this tile.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel coordinates of the tile, row by row.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y..self.y + self.height)
            .flat_map(move |py| (self.x..self.x + self.width).map(move |px| (px, py)))
    }
}

/// Split `[0, len)` into `parts` contiguous spans: span `i` is
/// `[len·i/parts, len·(i+1)/parts)`. Spans may be empty when `len < parts`.
pub(crate) fn split_span(len: u32, parts: u32) -> impl Iterator<Item = (u32, u32)> {
    let (len, n) = (u64::from(len), u64::from(parts));
    (0..n).map(move |i| {
        let start = (len * i / n) as u32;
        let end = (len * (i + 1) / n) as u32;
        (start, end - start)
    })
}

/// Partition a `width × height` raster into a `per_side × per_side` grid.
///
/// Always returns exactly `per_side²` tiles, ordered column by column; some
/// may be empty on tiny rasters.
pub fn build_tile_grid(width: u32, height: u32, per_side: u32) -> Vec<TileRect> {
    let mut tiles = Vec::with_capacity(per_side as usize * per_side as usize);
    for (x, w) in split_span(width, per_side) {
        for (y, h) in split_span(height, per_side) {
            tiles.push(TileRect {
                x,
                y,
                width: w,
                height: h,
            });
        }
    }
    tiles
}

/// Immutable description of one unit of fine-grained work.
///
/// The epoch and frame are captured at dispatch time; the job never reads the
/// engine's live viewport, only this copy.
#[derive(Debug, Clone, Copy)]
pub struct TileJob {
    pub rect: TileRect,
    pub epoch: u64,
    pub frame: Frame,
}
