pub mod annotate;
pub mod binarize;
pub mod calibration;
pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod marker;
pub mod measurement;
pub mod pipeline;
pub mod segmentation;
pub mod service;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cli::Cli;
pub use config::{AppConfig, MarkerPolicy, PipelineConfig, ServiceConfig};
pub use error::{MeasureError, Stage};
pub use marker::{MarkerDetection, MarkerLocator, SquareMarkerLocator};
pub use pipeline::{MeasurementResult, Pipeline};
pub use segmentation::{AdaptiveSegmenter, CandidateRegion, Segmenter};
pub use service::{ApiResponse, Service};
