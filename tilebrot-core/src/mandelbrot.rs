use crate::complex::Complex;
use crate::double_double::DoubleDouble;
use crate::error::CoreError;
use crate::fractal::Fractal;

/// Squared bailout radius: the orbit has escaped once `|z|² > 4`.
const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Orbit points closer than this (per axis) are treated as a cycle.
const PERIOD_TOLERANCE: f64 = 1e-28;

/// The Mandelbrot set: `z ← z² + c` from `z = 0`, in double-double precision.
#[derive(Debug, Clone)]
pub struct Mandelbrot {
    max_iterations: u32,
}

impl Mandelbrot {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 5000;

    pub fn new(max_iterations: u32) -> crate::Result<Self> {
        if max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(max_iterations));
        }
        Ok(Self { max_iterations })
    }
}

impl Default for Mandelbrot {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Closed-form membership test for the main cardioid.
#[inline]
fn in_cardioid(re: f64, im: f64) -> bool {
    let im2 = im * im;
    let q = (re - 0.25) * (re - 0.25) + im2;
    q * (q + (re - 0.25)) <= 0.25 * im2
}

/// Closed-form membership test for the period-2 bulb.
#[inline]
fn in_period2_bulb(re: f64, im: f64) -> bool {
    (re + 1.0) * (re + 1.0) + im * im <= 0.0625
}

impl Fractal for Mandelbrot {
    fn iterate(&self, c: Complex) -> u32 {
        let max_iter = self.max_iterations;

        // Never-escaping regions, answered without iterating.
        let (re, im) = c.to_f64();
        if in_cardioid(re, im) || in_period2_bulb(re, im) {
            return max_iter;
        }

        let escape = DoubleDouble::from(ESCAPE_RADIUS_SQ);
        let mut z = Complex::ZERO;

        // Brent's cycle detection: compare against a checkpoint whose
        // refresh interval doubles, sampling every 4th step after warm-up.
        let mut saved = z;
        let mut since_save: u32 = 0;
        let mut window: u32 = 3;

        for n in 0..max_iter {
            z = z.square_add(c);

            if z.norm_sq() > escape {
                return n;
            }

            if n >= 32 && n & 3 == 0 {
                if (z.re - saved.re).abs().hi < PERIOD_TOLERANCE
                    && (z.im - saved.im).abs().hi < PERIOD_TOLERANCE
                {
                    return max_iter;
                }
                since_save += 1;
                if since_save > window {
                    saved = z;
                    since_save = 0;
                    window = window.saturating_mul(2);
                }
            }
        }

        max_iter
    }

    fn max_iterations(&self) -> u32 {
        self.max_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The recurrence with no shortcuts, for cross-checking.
    fn naive(c: Complex, max_iter: u32) -> u32 {
        let mut z = Complex::ZERO;
        for n in 0..max_iter {
            z = z.square_add(c);
            if z.norm_sq() > DoubleDouble::from(4.0) {
                return n;
            }
        }
        max_iter
    }

    fn c(re: f64, im: f64) -> Complex {
        Complex::from_f64(re, im)
    }

    #[test]
    fn origin_never_escapes() {
        assert_eq!(Mandelbrot::default().iterate(c(0.0, 0.0)), 5000);
    }

    #[test]
    fn far_point_escapes_on_first_step() {
        assert_eq!(Mandelbrot::default().iterate(c(10.0, 0.0)), 0);
    }

    #[test]
    fn known_escape_count() {
        // z: 1, 2 (|z|² = 4, not > 4), 5 → escapes at n = 2
        assert_eq!(Mandelbrot::default().iterate(c(1.0, 0.0)), 2);
    }

    #[test]
    fn reference_corner_escapes_quickly() {
        let n = Mandelbrot::default().iterate(c(-2.5, -1.125));
        assert!(n < 5, "corner took {n} iterations");
    }

    #[test]
    fn period2_centre_is_capped() {
        assert_eq!(Mandelbrot::new(300).unwrap().iterate(c(-1.0, 0.0)), 300);
    }

    #[test]
    fn shortcuts_agree_with_plain_loop() {
        let m = Mandelbrot::new(500).unwrap();
        let points = [
            c(-0.75, 0.1),
            c(0.3, 0.5),
            c(-2.0, 0.0),
            c(1.0, 1.0),
            c(0.24, 0.0),
            c(-0.1, 0.65),
            c(-1.25, 0.05),
            c(0.26, 0.0),
        ];
        for &p in &points {
            assert_eq!(m.iterate(p), naive(p, 500), "mismatch at {p}");
        }
    }

    #[test]
    fn result_never_exceeds_cap() {
        let m = Mandelbrot::new(64).unwrap();
        for i in 0..40 {
            for j in 0..40 {
                let p = c(-2.0 + i as f64 * 0.065, -1.3 + j as f64 * 0.065);
                assert!(m.iterate(p) <= 64);
            }
        }
    }

    #[test]
    fn zero_cap_is_rejected() {
        assert!(Mandelbrot::new(0).is_err());
    }
}
