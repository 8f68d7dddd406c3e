use crate::double_double::DoubleDouble;

/// A point of the plane with double-double components.
///
/// Only the handful of operations the escape-time loop needs are provided.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: DoubleDouble,
    pub im: DoubleDouble,
}

impl Complex {
    pub const ZERO: Self = Self {
        re: DoubleDouble::ZERO,
        im: DoubleDouble::ZERO,
    };

    #[inline]
    pub fn new(re: DoubleDouble, im: DoubleDouble) -> Self {
        Self { re, im }
    }

    #[inline]
    pub fn from_f64(re: f64, im: f64) -> Self {
        Self::new(DoubleDouble::from(re), DoubleDouble::from(im))
    }

    /// `re² + im²`.
    #[inline]
    pub fn norm_sq(self) -> DoubleDouble {
        self.re.square() + self.im.square()
    }

    /// `z² + c`, the step of the quadratic recurrence.
    #[inline]
    pub fn square_add(self, c: Self) -> Self {
        Self {
            re: self.re.square() - self.im.square() + c.re,
            im: (self.re * self.im) * 2.0 + c.im,
        }
    }

    /// Collapse both components to `f64`.
    #[inline]
    pub fn to_f64(self) -> (f64, f64) {
        (self.re.to_f64(), self.im.to_f64())
    }
}

impl std::fmt::Display for Complex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (re, im) = self.to_f64();
        if im >= 0.0 {
            write!(f, "{re} + {im}i")
        } else {
            write!(f, "{re} - {}i", -im)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-14;

    fn c(re: f64, im: f64) -> Complex {
        Complex::from_f64(re, im)
    }

    fn approx(a: Complex, re: f64, im: f64) -> bool {
        let (ar, ai) = a.to_f64();
        (ar - re).abs() < EPSILON && (ai - im).abs() < EPSILON
    }

    #[test]
    fn square_add_step() {
        // (0.5 + 0.5i)² = 0.5i
        assert!(approx(c(0.5, 0.5).square_add(c(-0.75, 0.1)), -0.75, 0.6));
        // (1 + 2i)² = -3 + 4i
        assert!(approx(c(1.0, 2.0).square_add(Complex::ZERO), -3.0, 4.0));
    }

    #[test]
    fn norm_sq_of_pythagorean_pair() {
        assert_eq!(c(3.0, 4.0).norm_sq().to_f64(), 25.0);
    }

    #[test]
    fn display_signs() {
        assert_eq!(c(1.0, -2.0).to_string(), "1 - 2i");
        assert_eq!(c(-0.5, 0.0).to_string(), "-0.5 + 0i");
    }
}
