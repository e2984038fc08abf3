use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do when a photo shows more than one marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerPolicy {
    /// Use the first marker in discovery order
    #[default]
    First,
    /// Reject the photo as ambiguous
    RequireSingle,
}

/// Square fiducial detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub block_size: u32,
    pub offset: f64,
    /// Minimum contour length as a fraction of the longest image side
    pub min_perimeter_rate: f64,
    /// Polygon approximation tolerance as a fraction of contour length
    pub approx_accuracy_rate: f64,
    pub min_side_px: f64,
    /// Minimum grey-level spread between darkest and brightest cell
    pub min_cell_contrast: f64,
    pub max_border_error_rate: f64,
    pub max_hamming: u32,
    /// 25-bit payloads (row-major, MSB first) accepted as valid ids.
    /// Empty accepts any payload of the 5x5 family that passes
    /// `min_rotation_distance`.
    pub codebook: Vec<u32>,
    /// Without a codebook, the fewest bits a payload must differ from each
    /// of its own quarter turns. Rotation-symmetric patterns have no
    /// readable orientation and are rejected.
    pub min_rotation_distance: u32,
    pub policy: MarkerPolicy,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            block_size: 23,
            offset: 7.0,
            min_perimeter_rate: 0.03,
            approx_accuracy_rate: 0.03,
            min_side_px: 10.0,
            min_cell_contrast: 30.0,
            max_border_error_rate: 0.35,
            max_hamming: 0,
            codebook: Vec::new(),
            min_rotation_distance: 5,
            policy: MarkerPolicy::First,
        }
    }
}

/// Annotation styling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// TrueType font for labels; system fonts are tried when unset
    pub font_path: Option<PathBuf>,
    pub font_scale: f32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_scale: 26.0,
        }
    }
}

/// Tunable constants of the measurement pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Physical perimeter of the printed marker in centimeters
    pub marker_perimeter_cm: f64,
    /// Contours enclosing fewer square pixels are treated as noise
    pub min_area: f64,
    pub block_size: u32,
    pub offset: f64,
    pub marker: MarkerConfig,
    pub annotation: AnnotationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            marker_perimeter_cm: 20.0,
            min_area: 3000.0,
            block_size: 19,
            offset: 5.0,
            marker: MarkerConfig::default(),
            annotation: AnnotationConfig::default(),
        }
    }
}

/// Settings of the upload boundary around the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub output_dir: PathBuf,
    /// Prefix of the URL the annotated image is served under
    pub public_root: String,
    pub allowed_extensions: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("result"),
            public_root: "localhost:5000/".to_string(),
            allowed_extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
        }
    }
}

/// Everything the binary needs, loadable from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        if self.service.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid("allowed_extensions must not be empty".into()));
        }
        Ok(())
    }
}

fn check_block_size(name: &str, block_size: u32) -> Result<(), ConfigError> {
    if block_size < 3 || block_size % 2 == 0 {
        return Err(ConfigError::Invalid(format!(
            "{name} must be odd and at least 3, got {block_size}"
        )));
    }
    Ok(())
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.marker_perimeter_cm.is_finite() && self.marker_perimeter_cm > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "marker_perimeter_cm must be positive, got {}",
                self.marker_perimeter_cm
            )));
        }
        if !(self.min_area >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_area must be non-negative, got {}",
                self.min_area
            )));
        }
        check_block_size("block_size", self.block_size)?;
        check_block_size("marker.block_size", self.marker.block_size)?;
        if !(self.marker.approx_accuracy_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "marker.approx_accuracy_rate must be positive, got {}",
                self.marker.approx_accuracy_rate
            )));
        }
        if self.marker.codebook.iter().any(|&code| code >= 1 << 25) {
            return Err(ConfigError::Invalid("marker codes must fit in 25 bits".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.block_size, 19);
        assert_eq!(config.pipeline.min_area, 3000.0);
        assert_eq!(config.pipeline.marker_perimeter_cm, 20.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"pipeline": {"min_area": 1500, "marker": {"policy": "require-single"}}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pipeline.min_area, 1500.0);
        assert_eq!(config.pipeline.offset, 5.0);
        assert_eq!(config.pipeline.marker.policy, MarkerPolicy::RequireSingle);
        assert_eq!(config.pipeline.marker.min_rotation_distance, 5);
        assert_eq!(config.service.allowed_extensions.len(), 3);
    }

    #[test]
    fn test_even_block_size_rejected() {
        let mut config = PipelineConfig::default();
        config.block_size = 18;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_perimeter_rejected() {
        let mut config = PipelineConfig::default();
        config.marker_perimeter_cm = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_approximation_tolerance_rejected() {
        let mut config = PipelineConfig::default();
        config.marker.approx_accuracy_rate = 0.0;
        assert!(config.validate().is_err());
    }
}
