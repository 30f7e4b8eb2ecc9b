use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Plausible pixel densities for a rectified canvas.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleBounds {
    pub min_px_per_mm: f64,
    pub max_px_per_mm: f64,
}

impl Default for ScaleBounds {
    fn default() -> Self {
        Self {
            min_px_per_mm: 1.0,
            max_px_per_mm: 50.0,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ScaleError {
    #[error("scale {0} px/mm is not a positive finite number")]
    NotPositive(f64),
    #[error("scale {value} px/mm is outside [{min}, {max}]")]
    OutOfBounds { value: f64, min: f64, max: f64 },
}

/// Pixels per millimeter of the rectified canvas.
///
/// Only constructible through [`ScaleFactor::new`], so a value in hand is
/// always positive, finite and inside the bounds it was checked against.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    pub fn new(px_per_mm: f64, bounds: &ScaleBounds) -> Result<Self, ScaleError> {
        if !px_per_mm.is_finite() || px_per_mm <= 0.0 {
            return Err(ScaleError::NotPositive(px_per_mm));
        }
        if px_per_mm < bounds.min_px_per_mm || px_per_mm > bounds.max_px_per_mm {
            return Err(ScaleError::OutOfBounds {
                value: px_per_mm,
                min: bounds.min_px_per_mm,
                max: bounds.max_px_per_mm,
            });
        }
        Ok(Self(px_per_mm))
    }

    #[inline]
    pub fn px_per_mm(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn px_to_mm(self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(p.x / self.0, p.y / self.0)
    }

    #[inline]
    pub fn mm_to_px(self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(p.x * self.0, p.y * self.0)
    }

    /// Square millimeters covered by `px` square pixels.
    #[inline]
    pub fn area_px_to_mm2(self, px: f64) -> f64 {
        px / (self.0 * self.0)
    }

    #[inline]
    pub fn mm_to_px_len(self, mm: f64) -> f64 {
        mm * self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_finite_and_out_of_range() {
        let b = ScaleBounds::default();
        assert!(matches!(
            ScaleFactor::new(f64::NAN, &b),
            Err(ScaleError::NotPositive(_))
        ));
        assert!(ScaleFactor::new(0.0, &b).is_err());
        assert!(ScaleFactor::new(-3.0, &b).is_err());
        assert!(matches!(
            ScaleFactor::new(80.0, &b),
            Err(ScaleError::OutOfBounds { .. })
        ));
        assert_eq!(ScaleFactor::new(10.0, &b).unwrap().px_per_mm(), 10.0);
    }

    #[test]
    fn conversions() {
        let s = ScaleFactor::new(10.0, &ScaleBounds::default()).unwrap();
        assert_eq!(s.px_to_mm(Point2::new(25.0, 50.0)), Point2::new(2.5, 5.0));
        assert_eq!(s.area_px_to_mm2(150_000.0), 1500.0);
        assert_eq!(serde_json::to_string(&s).unwrap(), "10.0");
    }
}
