//! Upload boundary around the measurement pipeline.
//!
//! Validates and sanitizes the uploaded file name, decodes the image, runs
//! the pipeline, stores the annotated copy under the output directory and
//! wraps everything in the JSON envelope clients expect.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AppConfig, ServiceConfig};
use crate::error::MeasureError;
use crate::pipeline::Pipeline;

/// Prefix of stored annotated images
pub const RESULT_PREFIX: &str = "Result-";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported upload {name:?}")]
    UnsupportedFile { name: String },

    #[error(transparent)]
    Measure(#[from] MeasureError),

    #[error("failed to store annotated image {path:?}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to create output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    /// HTTP-style status for the response envelope
    pub fn status_code(&self) -> u16 {
        match self {
            UploadError::UnsupportedFile { .. } => 400,
            UploadError::Measure(MeasureError::InvalidInputImage(_)) => 400,
            UploadError::Measure(_)
            | UploadError::Store { .. }
            | UploadError::OutputDir { .. } => 500,
        }
    }

    /// What the person who took the photo should be told
    pub fn user_message(&self) -> String {
        match self {
            UploadError::UnsupportedFile { .. }
            | UploadError::Measure(MeasureError::InvalidInputImage(_)) => {
                "Please upload a clear png or jpg photo of the child with the marker visible"
                    .to_string()
            }
            UploadError::Measure(MeasureError::MarkerNotFound)
            | UploadError::Measure(MeasureError::InvalidMarkerGeometry { .. })
            | UploadError::Measure(MeasureError::InvalidCalibration { .. }) => {
                "Error: marker not detected, please retake the photo with the marker visible"
                    .to_string()
            }
            UploadError::Measure(MeasureError::AmbiguousMarker { count }) => format!(
                "Error: {count} markers detected, please retake the photo with a single marker"
            ),
            UploadError::Measure(MeasureError::NoObjectsDetected) => {
                "Error: no child detected, please retake the photo against a plain background"
                    .to_string()
            }
            UploadError::Store { .. } | UploadError::OutputDir { .. } => {
                "Error: could not store the result image".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
}

/// Payload of a successful measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasuredData {
    pub image_url: String,
    pub list_height: Vec<f64>,
    pub list_width: Vec<f64>,
    /// Height of the tallest object, i.e. the child
    pub tinggi_badan: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    Measured(MeasuredData),
    /// Serialized as `[]`
    Empty(Vec<MeasuredData>),
}

/// JSON envelope returned for every upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: Status,
    pub message: String,
    pub data: ResponseData,
}

impl ApiResponse {
    pub fn success(data: MeasuredData) -> Self {
        Self {
            status: Status::Success,
            message: "Height prediction succeeded (beta)".to_string(),
            data: ResponseData::Measured(data),
        }
    }

    pub fn failed(message: String) -> Self {
        Self {
            status: Status::Failed,
            message,
            data: ResponseData::Empty(Vec::new()),
        }
    }
}

/// True when the name has an extension from the allow-list (case-insensitive)
pub fn allowed_file(name: &str, allowed_extensions: &[String]) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Reduce a client-supplied file name to a safe, flat ASCII name.
///
/// Path separators become word breaks, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped and leading or trailing dots and
/// underscores are trimmed. May return an empty string.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// The measurement service: one pipeline plus where results go
pub struct Service {
    config: ServiceConfig,
    pipeline: Pipeline,
}

impl Service {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_pipeline(config.service.clone(), Pipeline::from_config(&config.pipeline))
    }

    pub fn with_pipeline(config: ServiceConfig, pipeline: Pipeline) -> Self {
        Self { config, pipeline }
    }

    fn public_url(&self, stored_name: &str) -> String {
        format!(
            "{}/result/{}",
            self.config.public_root.trim_end_matches('/'),
            stored_name
        )
    }

    /// Measure one uploaded photo and store its annotated copy
    pub fn handle(&self, filename: &str, bytes: &[u8]) -> Result<MeasuredData, UploadError> {
        if !allowed_file(filename, &self.config.allowed_extensions) {
            return Err(UploadError::UnsupportedFile {
                name: filename.to_string(),
            });
        }
        let name = secure_filename(filename);
        if !allowed_file(&name, &self.config.allowed_extensions) {
            return Err(UploadError::UnsupportedFile {
                name: filename.to_string(),
            });
        }

        let img = image::load_from_memory(bytes)
            .map_err(|e| MeasureError::InvalidInputImage(e.to_string()))?
            .to_rgb8();

        let result = self.pipeline.measure(&img)?;

        let dir = &self.config.output_dir;
        std::fs::create_dir_all(dir).map_err(|source| UploadError::OutputDir {
            path: dir.clone(),
            source,
        })?;
        let stored_name = format!("{RESULT_PREFIX}{name}");
        let path = dir.join(&stored_name);
        result
            .annotated
            .save(&path)
            .map_err(|source| UploadError::Store {
                path: path.clone(),
                source,
            })?;
        info!("Stored annotated image at {:?}", path);

        Ok(MeasuredData {
            image_url: self.public_url(&stored_name),
            list_height: result.heights_cm(),
            list_width: result.widths_cm(),
            tinggi_badan: result.subject_height_cm(),
        })
    }

    /// Status code and envelope for one upload; failures carry no data
    pub fn respond(&self, filename: &str, bytes: &[u8]) -> (u16, ApiResponse) {
        match self.handle(filename, bytes) {
            Ok(data) => (200, ApiResponse::success(data)),
            Err(err) => {
                warn!("Upload {:?} failed: {}", filename, err);
                (err.status_code(), ApiResponse::failed(err.user_message()))
            }
        }
    }
}
