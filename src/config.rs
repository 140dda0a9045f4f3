//! Configuration persistence for augmentation runs

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::augment::{Affine, FlipHorizontal, GaussianBlur, Multiply, OperatorSpec, Pipeline, Range};
use crate::error::Result;

/// Encoding for augmented images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            other => Err(format!("unsupported output format '{other}' (expected jpg or png)")),
        }
    }
}

/// Settings for one augmentation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Augmented copies written per source image
    pub iterations: u32,
    /// Base seed; None draws one from the OS per run
    pub seed: Option<u64>,
    /// Worker threads (None = available parallelism)
    pub workers: Option<usize>,
    /// Image encoding for outputs
    pub output_format: OutputFormat,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// Round vertices to whole pixels on extraction and write-back
    pub round_vertices: bool,
    /// Operators in execution order
    pub operators: Vec<OperatorSpec>,
}

/// Flip, rotate/scale, brighten, blur
fn default_operators() -> Vec<OperatorSpec> {
    vec![
        OperatorSpec::FlipHorizontal(FlipHorizontal { p: 0.5 }),
        OperatorSpec::Affine(Affine {
            rotate: Range::new(-45.0, 45.0),
            scale: Range::new(0.5, 1.2),
            translate_percent: Range::constant(0.0),
        }),
        OperatorSpec::Multiply(Multiply {
            factor: Range::new(0.5, 1.2),
        }),
        OperatorSpec::GaussianBlur(GaussianBlur {
            sigma: Range::new(0.0, 1.0),
        }),
    ]
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            seed: None,
            workers: None,
            output_format: OutputFormat::Jpeg,
            jpeg_quality: 90,
            round_vertices: true,
            operators: default_operators(),
        }
    }
}

impl AugmentConfig {
    /// Directory name under the platform config dir
    pub const APP_DIR: &'static str = "quickaug";
    pub const FILE_NAME: &'static str = "augment.json";

    /// Default location: `<config_dir>/quickaug/augment.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::APP_DIR).join(Self::FILE_NAME))
    }

    /// Read and parse a config file, failing on any read or parse error
    pub fn try_load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Load configuration from `path`, or return defaults if unavailable
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!(
                    "Could not load config {}, using defaults: {}",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load from the default location when a file exists there
    pub fn load_default() -> Self {
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::info!("Using config {}", path.display());
                Self::load(&path)
            }
            _ => Self::default(),
        }
    }

    /// Save configuration to disk as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Build the operator pipeline described by this config
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::from_specs(&self.operators).round_vertices(self.round_vertices)
    }
}
