use serde::Serialize;

use crate::complex::Complex;
use crate::double_double::DoubleDouble;
use crate::error::CoreError;

/// An axis-aligned rectangle of the plane, `(x, y)` being the corner that
/// maps onto pixel `(0, 0)`.
///
/// Pixel rows grow along `+y`; there is no axis flip, so the rectangle maps
/// linearly onto the raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Validates on load so a hand-edited config cannot smuggle in a degenerate rectangle.
impl<'de> serde::Deserialize<'de> for Viewport {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        struct Raw {
            x: f64,
            y: f64,
            width: f64,
            height: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        Viewport::new(raw.x, raw.y, raw.width, raw.height).map_err(serde::de::Error::custom)
    }
}

impl Viewport {
    /// The full set with a little margin: `(-2.5, -1.125)` spanning `4.0 × 2.5`.
    pub const REFERENCE: Self = Self {
        x: -2.5,
        y: -1.125,
        width: 4.0,
        height: 2.5,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> crate::Result<Self> {
        let vp = Self {
            x,
            y,
            width,
            height,
        };
        vp.validate()?;
        Ok(vp)
    }

    /// Check a rectangle that may have been assembled field by field.
    pub fn validate(&self) -> crate::Result<()> {
        let Self {
            x,
            y,
            width,
            height,
        } = *self;
        if !(x.is_finite() && y.is_finite()) {
            return Err(CoreError::InvalidViewport {
                reason: format!("corner must be finite, got ({x}, {y})"),
            });
        }
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(CoreError::InvalidViewport {
                reason: format!("extent must be positive and finite, got {width}×{height}"),
            });
        }
        Ok(())
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// A viewport bound to a pixel grid: the unit the evaluator maps through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub viewport: Viewport,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(viewport: Viewport, width: u32, height: u32) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidDimensions { width, height });
        }
        Ok(Self {
            viewport,
            width,
            height,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Map a pixel to its plane point: `x + width·px/W`, `y + height·py/H`.
    ///
    /// Interpolation is carried out in double-double so that deep zooms do not
    /// collapse adjacent pixels onto the same `f64`.
    #[inline]
    pub fn pixel_to_plane(&self, px: u32, py: u32) -> Complex {
        let vp = &self.viewport;
        let re = DoubleDouble::from(vp.x)
            + DoubleDouble::from(vp.width) * f64::from(px) / f64::from(self.width);
        let im = DoubleDouble::from(vp.y)
            + DoubleDouble::from(vp.height) * f64::from(py) / f64::from(self.height);
        Complex::new(re, im)
    }

    /// The plane rectangle covered by a pixel selection of this frame.
    ///
    /// The selection is anchored at `(left, top)` and grown along its short
    /// side until it has the frame's aspect ratio, so the zoomed frame is not
    /// stretched. This is how a host turns a rubber-band drag into the next
    /// viewport.
    pub fn select(&self, left: u32, top: u32, width: u32, height: u32) -> crate::Result<Viewport> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidViewport {
                reason: format!("empty selection {width}×{height}"),
            });
        }
        let (sw, sh) = self.snap_to_aspect(width, height);

        let vp = &self.viewport;
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        Viewport::new(
            vp.x + vp.width * f64::from(left) / w,
            vp.y + vp.height * f64::from(top) / h,
            vp.width * sw as f64 / w,
            vp.height * sh as f64 / h,
        )
    }

    /// Widen or heighten a `width × height` pixel rectangle to this frame's aspect ratio.
    fn snap_to_aspect(&self, width: u32, height: u32) -> (u64, u64) {
        let (fw, fh) = (u64::from(self.width), u64::from(self.height));
        let (rw, rh) = (u64::from(width), u64::from(height));
        if rw * fh < fw * rh {
            (rh * fw / fh, rh)
        } else {
            (rw, rw * fh / fw)
        }
    }
}
