// src/config.rs - Curvature run configuration loaded from TOML and overridden by the CLI

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{FiberMorphError, Result};

/// Configuration for a curvature run
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_input_directory")]
    pub input_directory: String,

    #[serde(default = "default_output_directory")]
    pub output_directory: String,

    /// Number of worker threads
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Pixels per millimetre
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    #[serde(default = "default_window_size")]
    pub window_size: f64,

    #[serde(default)]
    pub window_unit: WindowUnit,

    /// Save the intermediate stage images
    #[serde(default)]
    pub save_images: bool,

    /// Write the raw window curvatures of every element
    #[serde(default)]
    pub within_element: bool,

    /// Extension of the input images (without the dot)
    #[serde(default = "default_file_type")]
    pub file_type: String,

    // Particle thresholds
    #[serde(default = "default_min_fiber_px")]
    pub min_fiber_px: u32,

    #[serde(default = "default_min_arc_px")]
    pub min_arc_px: u32,

    #[serde(default = "default_border_buffer")]
    pub border_buffer: u32,

    /// Walk skeleton pixels along the arc before windowing instead of raster order
    #[serde(default)]
    pub order_arc_pixels: bool,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// Unit of the curvature window size
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindowUnit {
    /// Pixels
    #[default]
    Px,
    /// Millimetres, converted with the resolution
    Mm,
}

/// What the batch does when an image job fails
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Drop the image from the summary and keep going
    #[default]
    Skip,
    /// Finish the running jobs, then fail the batch without a summary
    Abort,
}

fn default_input_directory() -> String {
    "./input".to_string()
}

fn default_output_directory() -> String {
    "./output".to_string()
}

fn default_jobs() -> usize {
    num_cpus::get()
}

fn default_resolution() -> f64 {
    132.0
}

fn default_window_size() -> f64 {
    10.0
}

fn default_file_type() -> String {
    "tiff".to_string()
}

fn default_min_fiber_px() -> u32 {
    10
}

fn default_min_arc_px() -> u32 {
    5
}

fn default_border_buffer() -> u32 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_directory: default_input_directory(),
            output_directory: default_output_directory(),
            jobs: default_jobs(),
            resolution: default_resolution(),
            window_size: default_window_size(),
            window_unit: WindowUnit::Px,
            save_images: false,
            within_element: false,
            file_type: default_file_type(),
            min_fiber_px: default_min_fiber_px(),
            min_arc_px: default_min_arc_px(),
            border_buffer: default_border_buffer(),
            order_arc_pixels: false,
            failure_policy: FailurePolicy::Skip,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FiberMorphError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| FiberMorphError::ConfigLoad {
            source: e,
            path: path.to_path_buf(),
        })?;

        Ok(config)
    }

    /// Window size in pixels after unit conversion
    pub fn window_size_px(&self) -> usize {
        let px = match self.window_unit {
            WindowUnit::Px => self.window_size,
            WindowUnit::Mm => self.window_size * self.resolution,
        };
        px.round().max(0.0) as usize
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let input_path = PathBuf::from(&self.input_directory);
        if !input_path.is_dir() {
            return Err(FiberMorphError::InvalidPath(input_path));
        }

        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(FiberMorphError::Config(
                "resolution must be a positive number".to_string(),
            ));
        }

        if !(self.window_size.is_finite() && self.window_size > 0.0) {
            return Err(FiberMorphError::Config(
                "window_size must be a positive number".to_string(),
            ));
        }

        if self.jobs == 0 {
            return Err(FiberMorphError::Config("jobs must be >= 1".to_string()));
        }

        if self.file_type.trim_start_matches('.').is_empty() {
            return Err(FiberMorphError::Config(
                "file_type must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            FiberMorphError::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            input_directory = "/data/hair"
            resolution = 100.0
            window_unit = "mm"
            window_size = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.input_directory, "/data/hair");
        assert_eq!(config.window_unit, WindowUnit::Mm);
        assert_eq!(config.window_size_px(), 50);
        assert_eq!(config.min_arc_px, 5);
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
        assert!(config.jobs >= 1);
    }

    #[test]
    fn save_and_reload_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config {
            within_element: true,
            failure_policy: FailurePolicy::Abort,
            ..Config::default()
        };
        config.save_to_file(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert!(reloaded.within_element);
        assert_eq!(reloaded.failure_policy, FailurePolicy::Abort);
        assert_eq!(reloaded.file_type, "tiff");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let base = Config {
            input_directory: dir.path().to_string_lossy().into_owned(),
            ..Config::default()
        };
        assert!(base.validate().is_ok());

        let bad_resolution = Config { resolution: 0.0, ..base.clone() };
        assert!(matches!(bad_resolution.validate(), Err(FiberMorphError::Config(_))));

        let bad_jobs = Config { jobs: 0, ..base.clone() };
        assert!(bad_jobs.validate().is_err());

        let missing = Config {
            input_directory: dir.path().join("nope").to_string_lossy().into_owned(),
            ..base
        };
        assert!(matches!(missing.validate(), Err(FiberMorphError::InvalidPath(_))));
    }
}
