use tilebrot_core::{evaluate, Fractal, Frame};

use crate::normalize::Histogram;
use crate::store::FrameBuffers;
use crate::tile::split_span;

/// Output of the coarse pass: block-filled buffers plus the histogram seeded
/// with one count per block.
#[derive(Debug)]
pub struct CoarseFill {
    pub buffers: FrameBuffers,
    pub histogram: Histogram,
    pub blocks: usize,
}

/// Fill `buffers` with a blocky preview of `frame`.
///
/// The raster is cut into blocks of roughly `block_w × block_h` pixels
/// (`max(1, W / block_w)` columns, `max(1, H / block_h)` rows). Each block
/// is evaluated once at its top-left pixel, that pixel is flagged as computed,
/// and the value is copied across the block.
pub fn coarse_pass<F: Fractal + ?Sized>(
    fractal: &F,
    frame: &Frame,
    block_w: u32,
    block_h: u32,
    mut buffers: FrameBuffers,
) -> CoarseFill {
    debug_assert_eq!((buffers.width, buffers.height), (frame.width, frame.height));

    let cols = (frame.width / block_w.max(1)).max(1);
    let rows = (frame.height / block_h.max(1)).max(1);
    let mut histogram = Histogram::new();

    for (left, bw) in split_span(frame.width, cols) {
        for (top, bh) in split_span(frame.height, rows) {
            let value = evaluate(fractal, frame, left, top);
            *histogram.entry(value).or_insert(0) += 1;

            let rep = buffers.index(left, top);
            buffers.computed[rep] = true;

            for py in top..top + bh {
                let row = buffers.index(left, py);
                buffers.iterations[row..row + bw as usize].fill(value);
            }
        }
    }

    CoarseFill {
        buffers,
        histogram,
        blocks: cols as usize * rows as usize,
    }
}
