//! JSON configuration of a scan pipeline.
//!
//! Every section falls back to its defaults, so a partial file such as
//! `{"rectify": {"px_per_mm": 8.0}}` is a complete configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use shapescan_core::{HomographyTolerance, ScaleBounds, ScaleFactor, SheetLayout};
use shapescan_fiducial::{FiducialDetector, FiducialParams};
use shapescan_segment::SegmentParams;
use shapescan_vector::VectorizeParams;

use crate::error::ConfigError;

/// Limits applied while decoding an upload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadParams {
    pub max_upload_bytes: usize,
    /// Longer images are downscaled to this side.
    pub max_dimension_px: u32,
    /// Images with a shorter side are rejected.
    pub min_dimension_px: u32,
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            max_dimension_px: 4096,
            min_dimension_px: 64,
        }
    }
}

/// Rectified canvas density and homography acceptance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyParams {
    pub px_per_mm: f64,
    /// Separation and residual limits are in photo pixels.
    pub tolerance: HomographyTolerance,
}

impl Default for RectifyParams {
    fn default() -> Self {
        Self {
            px_per_mm: 10.0,
            tolerance: HomographyTolerance::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleParams {
    pub bounds: ScaleBounds,
    /// Largest accepted relative difference between the density measured on
    /// the rectified markers and the configured one.
    pub max_deviation: f64,
    /// Largest accepted relative difference between the marker side length
    /// measured on the rectified outlines and the printed one.
    pub max_outline_deviation: f64,
}

impl Default for ScaleParams {
    fn default() -> Self {
        Self {
            bounds: ScaleBounds::default(),
            max_deviation: 0.005,
            max_outline_deviation: 0.05,
        }
    }
}

/// Full pipeline configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub load: LoadParams,
    pub sheet: SheetLayout,
    pub fiducial: FiducialParams,
    pub rectify: RectifyParams,
    pub scale: ScaleParams,
    pub segment: SegmentParams,
    pub vectorize: VectorizeParams,
}

impl ScanConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let load = &self.load;
        if load.max_upload_bytes == 0 {
            return Err(ConfigError::invalid("load", "max_upload_bytes must be positive"));
        }
        if load.min_dimension_px == 0 || load.max_dimension_px < load.min_dimension_px {
            return Err(ConfigError::invalid(
                "load",
                "dimensions must satisfy 0 < min_dimension_px <= max_dimension_px",
            ));
        }
        self.sheet
            .validate()
            .map_err(|e| ConfigError::invalid("sheet", e))?;
        // the detector checks the layout's ids against its dictionary
        FiducialDetector::new(self.fiducial.clone(), self.sheet.clone())
            .map_err(|e| ConfigError::invalid("fiducial", e))?;
        let tol = &self.rectify.tolerance;
        let limits = [
            tol.min_separation,
            tol.collinearity_tol,
            tol.min_normalized_det,
            tol.max_residual,
        ];
        if limits.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::invalid(
                "rectify",
                "tolerances must be finite and non-negative",
            ));
        }
        let bounds = &self.scale.bounds;
        if !(bounds.min_px_per_mm > 0.0 && bounds.min_px_per_mm <= bounds.max_px_per_mm) {
            return Err(ConfigError::invalid(
                "scale",
                "bounds must satisfy 0 < min_px_per_mm <= max_px_per_mm",
            ));
        }
        if !(self.scale.max_deviation > 0.0 && self.scale.max_deviation < 0.5) {
            return Err(ConfigError::invalid("scale", "max_deviation must be in (0, 0.5)"));
        }
        if !(self.scale.max_outline_deviation > 0.0 && self.scale.max_outline_deviation < 0.5) {
            return Err(ConfigError::invalid(
                "scale",
                "max_outline_deviation must be in (0, 0.5)",
            ));
        }
        ScaleFactor::new(self.rectify.px_per_mm, bounds)
            .map_err(|e| ConfigError::invalid("rectify", e))?;
        self.segment
            .validate()
            .map_err(|e| ConfigError::invalid("segment", e))?;
        self.vectorize
            .validate()
            .map_err(|e| ConfigError::invalid("vectorize", e))?;
        Ok(())
    }
}
