use clap::Parser;
use std::path::PathBuf;

use crate::config::{AppConfig, ConfigError, MarkerPolicy};

#[derive(Parser, Debug)]
#[command(name = "tinggi")]
#[command(
    version,
    about = "Measure a child's height from a photo with a printed square marker as scale"
)]
pub struct Cli {
    /// Input photo (png, jpg or jpeg)
    #[arg(required = true)]
    pub input: PathBuf,

    /// JSON config file; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for annotated images [default: result]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// URL prefix the output directory is served under [default: localhost:5000/]
    #[arg(long)]
    pub public_root: Option<String>,

    /// Printed marker perimeter in cm [default: 20]
    #[arg(long, value_parser = parse_positive)]
    pub marker_perimeter: Option<f64>,

    /// Minimum object area in square pixels [default: 3000]
    #[arg(long)]
    pub min_area: Option<f64>,

    /// Adaptive threshold block size, odd [default: 19]
    #[arg(long)]
    pub block_size: Option<u32>,

    /// Adaptive threshold offset [default: 5]
    #[arg(long)]
    pub offset: Option<f64>,

    /// What to do when several markers are visible [default: first]
    #[arg(long, value_enum)]
    pub marker_policy: Option<MarkerPolicy>,

    /// TrueType font for the measurement labels
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Show detection details
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    /// Config file (or defaults) with command-line overrides applied
    pub fn app_config(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_json_file(path)?,
            None => AppConfig::default(),
        };

        let pipeline = &mut config.pipeline;
        if let Some(v) = self.marker_perimeter {
            pipeline.marker_perimeter_cm = v;
        }
        if let Some(v) = self.min_area {
            pipeline.min_area = v;
        }
        if let Some(v) = self.block_size {
            pipeline.block_size = v;
        }
        if let Some(v) = self.offset {
            pipeline.offset = v;
        }
        if let Some(v) = self.marker_policy {
            pipeline.marker.policy = v;
        }
        if let Some(v) = &self.font {
            pipeline.annotation.font_path = Some(v.clone());
        }
        if let Some(v) = &self.output_dir {
            config.service.output_dir = v.clone();
        }
        if let Some(v) = &self.public_root {
            config.service.public_root = v.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_positive(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !(value.is_finite() && value > 0.0) {
        return Err("Value must be positive".to_string());
    }
    Ok(value)
}
