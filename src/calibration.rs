use crate::error::{MeasureError, Result};
use crate::geometry::{closed_perimeter, Point};

/// Pixels per centimeter, always positive and finite
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ScaleRatio(f64);

impl ScaleRatio {
    pub fn new(px_per_cm: f64) -> Result<Self> {
        if px_per_cm.is_finite() && px_per_cm > 0.0 {
            Ok(Self(px_per_cm))
        } else {
            Err(MeasureError::InvalidCalibration { ratio: px_per_cm })
        }
    }

    pub fn px_per_cm(&self) -> f64 {
        self.0
    }

    /// Convert a pixel length to centimeters
    pub fn to_cm(&self, px: f64) -> f64 {
        px / self.0
    }
}

/// Derive the pixel-to-cm ratio from the marker corners and its printed perimeter
pub fn calibrate(corners: &[Point], marker_perimeter_cm: f64) -> Result<ScaleRatio> {
    if corners.len() < 4 {
        return Err(MeasureError::InvalidMarkerGeometry {
            corners: corners.len(),
        });
    }
    ScaleRatio::new(closed_perimeter(corners) / marker_perimeter_cm)
}
