use image::RgbImage;
use tracing::{debug, info};

use crate::annotate::{layout, AnnotationLayout, Annotator};
use crate::calibration::{calibrate, ScaleRatio};
use crate::config::{MarkerPolicy, PipelineConfig};
use crate::error::{MeasureError, Result, Stage};
use crate::marker::{select_marker, MarkerDetection, MarkerLocator, SquareMarkerLocator};
use crate::measurement::{extract, BoundingBox, Measurement};
use crate::segmentation::{AdaptiveSegmenter, CandidateRegion, Segmenter};

/// One measured foreground object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeasurement {
    pub region: CandidateRegion,
    pub bbox: BoundingBox,
    pub measurement: Measurement,
}

/// Output of a successful run
#[derive(Debug, Clone)]
pub struct MeasurementResult {
    pub marker: MarkerDetection,
    pub ratio: ScaleRatio,
    /// Contour discovery order
    pub objects: Vec<ObjectMeasurement>,
    /// Index of the tallest object, taken as the subject
    pub subject_index: usize,
    pub layout: AnnotationLayout,
    pub annotated: RgbImage,
}

impl MeasurementResult {
    pub fn subject_height_cm(&self) -> f64 {
        self.objects[self.subject_index].measurement.height_cm
    }

    pub fn heights_cm(&self) -> Vec<f64> {
        self.objects.iter().map(|o| o.measurement.height_cm).collect()
    }

    pub fn widths_cm(&self) -> Vec<f64> {
        self.objects.iter().map(|o| o.measurement.width_cm).collect()
    }
}

/// Index of the largest height; the first one wins ties
fn tallest(objects: &[ObjectMeasurement]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, o) in objects.iter().enumerate() {
        let h = o.measurement.height_cm;
        if best.map_or(true, |(_, bh)| h > bh) {
            best = Some((i, h));
        }
    }
    best.map(|(i, _)| i)
}

/// Marker-scaled measurement of every object in a photo.
///
/// Holds no per-request state, so one instance can serve any number of
/// requests, including concurrently from several threads.
pub struct Pipeline<L = SquareMarkerLocator, S = AdaptiveSegmenter> {
    locator: L,
    segmenter: S,
    annotator: Annotator,
    marker_perimeter_cm: f64,
    policy: MarkerPolicy,
}

impl Pipeline {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            locator: SquareMarkerLocator::new(config.marker.clone()),
            segmenter: AdaptiveSegmenter::from_config(config),
            annotator: Annotator::from_config(&config.annotation),
            marker_perimeter_cm: config.marker_perimeter_cm,
            policy: config.marker.policy,
        }
    }
}

impl<L: MarkerLocator, S: Segmenter> Pipeline<L, S> {
    /// Assemble a pipeline from custom stages
    pub fn with_stages(
        locator: L,
        segmenter: S,
        annotator: Annotator,
        marker_perimeter_cm: f64,
        policy: MarkerPolicy,
    ) -> Self {
        Self {
            locator,
            segmenter,
            annotator,
            marker_perimeter_cm,
            policy,
        }
    }

    /// Run every stage in order. The first failure ends the request.
    pub fn measure(&self, img: &RgbImage) -> Result<MeasurementResult> {
        if img.width() == 0 || img.height() == 0 {
            return Err(MeasureError::InvalidInputImage(format!(
                "image has zero size ({}x{})",
                img.width(),
                img.height()
            )));
        }
        debug!(stage = %Stage::Start, "Measuring {}x{} image", img.width(), img.height());

        let marker = select_marker(self.locator.locate(img), self.policy)?;
        debug!(stage = %Stage::MarkerLocated, "Marker perimeter {:.1}px", marker.perimeter());

        let ratio = calibrate(&marker.corners, self.marker_perimeter_cm)?;
        debug!(stage = %Stage::Calibrated, "Scale {:.3} px/cm", ratio.px_per_cm());

        let regions = self.segmenter.segment(img);
        debug!(stage = %Stage::Segmented, "{} candidate regions", regions.len());

        let objects: Vec<ObjectMeasurement> = regions
            .into_iter()
            .map(|region| {
                let (bbox, measurement) = extract(&region, ratio);
                ObjectMeasurement {
                    region,
                    bbox,
                    measurement,
                }
            })
            .collect();
        let subject_index = tallest(&objects).ok_or(MeasureError::NoObjectsDetected)?;
        debug!(stage = %Stage::Measured, "Subject is object {}", subject_index);

        let pairs: Vec<(BoundingBox, Measurement)> =
            objects.iter().map(|o| (o.bbox, o.measurement)).collect();
        let layout = layout(&marker.corners, &pairs);
        let annotated = self.annotator.render(img, &layout);
        debug!(stage = %Stage::Annotated, "Drew {} objects", objects.len());

        let result = MeasurementResult {
            marker,
            ratio,
            objects,
            subject_index,
            layout,
            annotated,
        };
        info!(
            stage = %Stage::Done,
            "Measured {} objects, subject height {:.1} cm",
            result.objects.len(),
            result.subject_height_cm()
        );
        Ok(result)
    }
}
