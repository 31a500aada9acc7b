//! TOML configuration for the `groundcloud` binary.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the stock settings. Command-line flags override what is loaded here.

use groundcloud_segmentation::{GroundError, PlaneSweepParams};
use groundcloud_terrain::{RansacParams, SmrfParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub preprocess: PreprocessConfig,
    pub ransac: RansacConfig,
    pub smrf: SmrfConfig,
    pub output: OutputConfig,
}

/// Merge, downsample, normals and outlier removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessConfig {
    /// Folder of `*.txt` tiles (x y z r g b ...).
    pub input_dir: PathBuf,
    pub voxel_size: f64,
    pub use_rgb: bool,
    /// Hybrid neighbourhood for normal estimation.
    pub normal_radius: f64,
    pub normal_max_nn: usize,
    /// Statistical outlier removal.
    pub outlier_neighbors: usize,
    pub outlier_std_ratio: f64,
    pub outlier_passes: usize,
    /// Write binary instead of ASCII PLY.
    pub binary: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            voxel_size: 0.0001,
            use_rgb: true,
            normal_radius: 0.5,
            normal_max_nn: 30,
            outlier_neighbors: 20,
            outlier_std_ratio: 2.0,
            outlier_passes: 2,
            binary: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RansacConfig {
    pub distance_threshold: f64,
    pub min_support_ratio: f64,
    pub max_rounds: usize,
    pub iterations: usize,
    pub seed: Option<u64>,
}

impl Default for RansacConfig {
    fn default() -> Self {
        let sweep = PlaneSweepParams::default();
        let ransac = RansacParams::default();
        Self {
            distance_threshold: sweep.distance_threshold,
            min_support_ratio: sweep.min_support_ratio,
            max_rounds: sweep.max_rounds,
            iterations: ransac.iterations,
            seed: ransac.seed,
        }
    }
}

impl RansacConfig {
    pub fn params(&self) -> RansacParams {
        RansacParams {
            sweep: PlaneSweepParams {
                distance_threshold: self.distance_threshold,
                min_support_ratio: self.min_support_ratio,
                max_rounds: self.max_rounds,
            },
            iterations: self.iterations,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmrfConfig {
    pub slope: f64,
    pub window: f64,
    pub threshold: f64,
    pub scalar: f64,
    /// PDAL executable.
    pub pdal: String,
}

impl Default for SmrfConfig {
    fn default() -> Self {
        let p = SmrfParams::default();
        Self {
            slope: p.slope,
            window: p.window,
            threshold: p.threshold,
            scalar: p.scalar,
            pdal: "pdal".to_string(),
        }
    }
}

impl SmrfConfig {
    pub fn params(&self) -> SmrfParams {
        SmrfParams {
            slope: self.slope,
            window: self.window,
            threshold: self.threshold,
            scalar: self.scalar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Root folder for every file the commands write.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

fn positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be finite and > 0, got {}", v),
        })
    }
}

fn at_least_one(field: &'static str, v: usize) -> Result<(), ConfigError> {
    if v >= 1 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "must be at least 1".to_string(),
        })
    }
}

impl Config {
    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.preprocess;
        positive("preprocess.voxel_size", p.voxel_size)?;
        positive("preprocess.normal_radius", p.normal_radius)?;
        positive("preprocess.outlier_std_ratio", p.outlier_std_ratio)?;
        at_least_one("preprocess.normal_max_nn", p.normal_max_nn)?;
        at_least_one("preprocess.outlier_neighbors", p.outlier_neighbors)?;

        let r = &self.ransac;
        at_least_one("ransac.iterations", r.iterations)?;
        r.params().sweep.validate().map_err(|e| match e {
            GroundError::InvalidParameter { name, reason } => ConfigError::Invalid {
                field: ransac_field(name),
                reason,
            },
            other => ConfigError::Invalid {
                field: "ransac",
                reason: other.to_string(),
            },
        })?;

        let s = &self.smrf;
        positive("smrf.slope", s.slope)?;
        positive("smrf.window", s.window)?;
        positive("smrf.threshold", s.threshold)?;
        positive("smrf.scalar", s.scalar)?;
        if s.pdal.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "smrf.pdal",
                reason: "must name an executable".to_string(),
            });
        }
        Ok(())
    }
}

fn ransac_field(name: &str) -> &'static str {
    match name {
        "distance_threshold" => "ransac.distance_threshold",
        "min_support_ratio" => "ransac.min_support_ratio",
        "max_rounds" => "ransac.max_rounds",
        _ => "ransac",
    }
}
