use serde::Serialize;

use crate::calibration::ScaleRatio;
use crate::geometry::{min_area_rect, Point, RotatedRect};
use crate::segmentation::CandidateRegion;

/// Minimum-area rectangle around a region, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub center: Point,
    pub width: f64,
    pub height: f64,
    /// Degrees; carried for drawing only
    pub angle: f64,
}

impl BoundingBox {
    pub fn corners(&self) -> [Point; 4] {
        self.as_rect().corners()
    }

    fn as_rect(&self) -> RotatedRect {
        RotatedRect {
            center: self.center,
            width: self.width,
            height: self.height,
            angle: self.angle,
        }
    }
}

impl From<RotatedRect> for BoundingBox {
    fn from(rect: RotatedRect) -> Self {
        Self {
            center: rect.center,
            width: rect.width,
            height: rect.height,
            angle: rect.angle,
        }
    }
}

/// Physical size of one object
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement {
    pub width_cm: f64,
    pub height_cm: f64,
}

/// Fit the bounding box of a region and convert it to centimeters
pub fn extract(region: &CandidateRegion, ratio: ScaleRatio) -> (BoundingBox, Measurement) {
    let bbox = BoundingBox::from(min_area_rect(&region.contour));
    (bbox, measure_box(&bbox, ratio))
}

/// Convert a pixel-space box to centimeters
pub fn measure_box(bbox: &BoundingBox, ratio: ScaleRatio) -> Measurement {
    Measurement {
        width_cm: ratio.to_cm(bbox.width),
        height_cm: ratio.to_cm(bbox.height),
    }
}
