use thiserror::Error;

/// Stage of the measurement pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    MarkerLocated,
    Calibrated,
    Segmented,
    Measured,
    Annotated,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::MarkerLocated => "marker located",
            Stage::Calibrated => "calibrated",
            Stage::Segmented => "segmented",
            Stage::Measured => "measured",
            Stage::Annotated => "annotated",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Every way a single measurement request can fail. All of them are terminal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeasureError {
    #[error("no fiducial marker detected")]
    MarkerNotFound,

    #[error("expected exactly one fiducial marker, found {count}")]
    AmbiguousMarker { count: usize },

    #[error("marker geometry needs 4 corners, got {corners}")]
    InvalidMarkerGeometry { corners: usize },

    #[error("scale ratio must be positive and finite, got {ratio}")]
    InvalidCalibration { ratio: f64 },

    #[error("no objects above the minimum contour area")]
    NoObjectsDetected,

    #[error("invalid input image: {0}")]
    InvalidInputImage(String),
}

impl MeasureError {
    /// The last stage the pipeline reached before failing.
    pub fn stage(&self) -> Stage {
        match self {
            MeasureError::InvalidInputImage(_)
            | MeasureError::MarkerNotFound
            | MeasureError::AmbiguousMarker { .. } => Stage::Start,
            MeasureError::InvalidMarkerGeometry { .. }
            | MeasureError::InvalidCalibration { .. } => Stage::MarkerLocated,
            MeasureError::NoObjectsDetected => Stage::Segmented,
        }
    }
}

pub type Result<T> = std::result::Result<T, MeasureError>;
