use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// An unevaluated sum `hi + lo` of two `f64` values, giving ~31 significant digits.
///
/// The pair is kept normalised (`|lo| ≤ ½ ulp(hi)`) by the error-free
/// transforms below. This is enough headroom to keep neighbouring pixels
/// distinct well past the zoom depth where plain `f64` starts to band.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleDouble {
    pub hi: f64,
    pub lo: f64,
}

// ---------------------------------------------------------------------------
// Error-free transforms
// ---------------------------------------------------------------------------

/// `a + b` split into the rounded sum and its exact rounding error.
#[inline]
fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    (s, (a - (s - bb)) + (b - bb))
}

/// Like [`two_sum`] but requires `|a| >= |b|`.
#[inline]
fn fast_two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    (s, b - (s - a))
}

/// `a * b` split into the rounded product and its exact rounding error (via FMA).
#[inline]
fn two_prod(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    (p, a.mul_add(b, -p))
}

impl DoubleDouble {
    pub const ZERO: Self = Self { hi: 0.0, lo: 0.0 };

    #[inline]
    pub fn new(hi: f64, lo: f64) -> Self {
        let (hi, lo) = two_sum(hi, lo);
        Self { hi, lo }
    }

    /// Collapse to the nearest `f64`.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.hi + self.lo
    }

    #[inline]
    pub fn abs(self) -> Self {
        if self.hi < 0.0 || (self.hi == 0.0 && self.lo < 0.0) {
            -self
        } else {
            self
        }
    }

    /// `self²`, cheaper than `self * self` because the cross term is doubled once.
    #[inline]
    pub fn square(self) -> Self {
        let (p, e) = two_prod(self.hi, self.hi);
        let e = e + 2.0 * self.hi * self.lo;
        let (hi, lo) = fast_two_sum(p, e);
        Self { hi, lo }
    }
}

impl From<f64> for DoubleDouble {
    #[inline]
    fn from(hi: f64) -> Self {
        Self { hi, lo: 0.0 }
    }
}

impl Add for DoubleDouble {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        let (s, e) = two_sum(self.hi, rhs.hi);
        let (t, f) = two_sum(self.lo, rhs.lo);
        let (s, e) = fast_two_sum(s, e + t);
        let (hi, lo) = fast_two_sum(s, e + f);
        Self { hi, lo }
    }
}

impl Sub for DoubleDouble {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Neg for DoubleDouble {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            hi: -self.hi,
            lo: -self.lo,
        }
    }
}

impl Mul for DoubleDouble {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let (p, e) = two_prod(self.hi, rhs.hi);
        let e = e + (self.hi * rhs.lo + self.lo * rhs.hi);
        let (hi, lo) = fast_two_sum(p, e);
        Self { hi, lo }
    }
}

impl Mul<f64> for DoubleDouble {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        let (p, e) = two_prod(self.hi, rhs);
        let (hi, lo) = fast_two_sum(p, e + self.lo * rhs);
        Self { hi, lo }
    }
}

/// Long division by an `f64`: one correction step on top of the `hi / rhs` estimate.
impl Div<f64> for DoubleDouble {
    type Output = Self;

    #[inline]
    fn div(self, rhs: f64) -> Self {
        let q1 = self.hi / rhs;
        let (p, e) = two_prod(q1, rhs);
        let (s, f) = two_sum(self.hi, -p);
        let q2 = (s + (f - e + self.lo)) / rhs;
        let (hi, lo) = fast_two_sum(q1, q2);
        Self { hi, lo }
    }
}

impl PartialEq for DoubleDouble {
    fn eq(&self, other: &Self) -> bool {
        self.hi == other.hi && self.lo == other.lo
    }
}

impl PartialOrd for DoubleDouble {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.hi.partial_cmp(&other.hi)? {
            Ordering::Equal => self.lo.partial_cmp(&other.lo),
            ord => Some(ord),
        }
    }
}

impl fmt::Display for DoubleDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.17e}{:+.3e}", self.hi, self.lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dd(v: f64) -> DoubleDouble {
        DoubleDouble::from(v)
    }

    fn close(a: DoubleDouble, b: DoubleDouble, eps: f64) -> bool {
        (a - b).abs().hi < eps
    }

    #[test]
    fn new_normalises_components() {
        let d = DoubleDouble::new(1e-20, 1.0);
        assert_eq!(d.hi, 1.0);
        assert_eq!(d.lo, 1e-20);
    }

    #[test]
    fn small_addend_survives() {
        // 1.0 + 1e-17 rounds to 1.0 in f64.
        let sum = dd(1.0) + dd(1e-17);
        let back = (sum - dd(1.0)).to_f64();
        assert!((back - 1e-17).abs() < 1e-32, "got {back}");
    }

    #[test]
    fn cancellation_keeps_low_bits() {
        let a = DoubleDouble::new(1.0, 1e-22);
        let diff = a - dd(1.0);
        assert!((diff.to_f64() - 1e-22).abs() < 1e-37);
    }

    #[test]
    fn product_tracks_cross_terms() {
        let a = DoubleDouble::new(1.0, 1e-16);
        let expected = DoubleDouble::new(1.0, 2e-16) + dd(1e-32);
        assert!(close(a * a, expected, 1e-31));
    }

    #[test]
    fn square_matches_product() {
        let a = DoubleDouble::new(-0.743643887037151, 1.3e-17);
        assert!(close(a.square(), a * a, 1e-30));
    }

    #[test]
    fn scalar_product() {
        assert!(close(dd(2.5) * 4.0, dd(10.0), 1e-30));
    }

    #[test]
    fn division_by_f64() {
        // 1/3 is not representable; three thirds must come back to one.
        let third = dd(1.0) / 3.0;
        assert!(close(third * 3.0, dd(1.0), 1e-31));
        assert!(close(dd(4.0) * 1600.0 / 1600.0, dd(4.0), 1e-30));
    }

    #[test]
    fn ordering_uses_low_word() {
        assert!(DoubleDouble::new(4.0, 1e-20) > dd(4.0));
        assert!(dd(-1.0) < dd(1.0));
        assert!(!(dd(4.0) > dd(4.0)));
    }

    #[test]
    fn abs_flips_negative() {
        assert_eq!(dd(-3.0).abs(), dd(3.0));
        assert_eq!(dd(3.0).abs(), dd(3.0));
    }
}
