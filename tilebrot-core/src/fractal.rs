use crate::complex::Complex;
use crate::viewport::Frame;

/// An escape-time recurrence evaluated at a single plane point.
///
/// Designed for **static dispatch**: the engine is generic over `F: Fractal`
/// so the compiler can inline the hot loop into each tile job.
pub trait Fractal {
    /// Iterate from the point `c` and return the escape count, or
    /// [`max_iterations`](Self::max_iterations) if the orbit never escapes.
    fn iterate(&self, c: Complex) -> u32;

    /// Upper bound on any value returned by [`iterate`](Self::iterate).
    fn max_iterations(&self) -> u32;
}

/// Evaluate one pixel of `frame`: map it onto the plane, then iterate.
///
/// Deterministic and side-effect free; the result is clamped to
/// `0..=max_iterations` whatever the recurrence reports.
#[inline]
pub fn evaluate<F: Fractal + ?Sized>(fractal: &F, frame: &Frame, px: u32, py: u32) -> u32 {
    fractal
        .iterate(frame.pixel_to_plane(px, py))
        .min(fractal.max_iterations())
}
