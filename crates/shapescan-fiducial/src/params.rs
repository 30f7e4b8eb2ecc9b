use serde::{Deserialize, Serialize};

use crate::error::FiducialError;

/// Fiducial detection parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiducialParams {
    /// Adaptive threshold windows as fractions of the shorter image side.
    pub window_fractions: Vec<f64>,
    pub min_window_px: usize,
    pub max_window_px: usize,
    /// Gray levels below the local mean for a pixel to count as dark.
    pub threshold_offset: f64,
    /// Minimum quad side (and component bounding box side) in pixels.
    pub min_side_px: f64,
    /// Components larger than this share of the image are ignored.
    pub max_area_frac: f64,
    /// Douglas-Peucker epsilon relative to the component perimeter.
    pub approx_epsilon_frac: f64,
    /// Fraction of the marker to ignore near its outline when sampling.
    pub inset_frac: f64,
    /// Required ratio of black border cells.
    pub min_border_score: f64,
    pub max_hamming: u8,
    pub min_confidence: f64,
    /// Best candidates kept per id before corner assignment.
    pub max_candidates_per_id: usize,
    /// Minimum pairwise distance of the selected marker centers.
    pub min_separation_px: f64,
    /// Minimum triangle area of any three centers over the squared longest side.
    pub collinearity_tol: f64,
    /// Allowed disagreement between a marker's decoded rotation and the sheet axis.
    pub max_rotation_error_deg: f64,
}

impl Default for FiducialParams {
    fn default() -> Self {
        Self {
            window_fractions: vec![1.0 / 40.0, 1.0 / 15.0],
            min_window_px: 15,
            max_window_px: 301,
            threshold_offset: 10.0,
            min_side_px: 16.0,
            max_area_frac: 0.25,
            approx_epsilon_frac: 0.04,
            inset_frac: 0.04,
            min_border_score: 0.85,
            max_hamming: 2,
            min_confidence: 0.3,
            max_candidates_per_id: 3,
            min_separation_px: 8.0,
            collinearity_tol: 1e-3,
            max_rotation_error_deg: 45.0,
        }
    }
}

impl FiducialParams {
    pub fn validate(&self) -> Result<(), FiducialError> {
        if self.window_fractions.is_empty()
            || self
                .window_fractions
                .iter()
                .any(|f| !f.is_finite() || *f <= 0.0 || *f > 1.0)
        {
            return Err(FiducialError::InvalidParams(
                "window_fractions must be non-empty values in (0, 1]".into(),
            ));
        }
        if self.min_window_px < 3 || self.max_window_px < self.min_window_px {
            return Err(FiducialError::InvalidParams(
                "window bounds must satisfy 3 <= min_window_px <= max_window_px".into(),
            ));
        }
        if !(0.0..=0.5).contains(&self.approx_epsilon_frac) || self.approx_epsilon_frac == 0.0 {
            return Err(FiducialError::InvalidParams(
                "approx_epsilon_frac must be in (0, 0.5]".into(),
            ));
        }
        if !(0.0..0.2).contains(&self.inset_frac) {
            return Err(FiducialError::InvalidParams(
                "inset_frac must be in [0, 0.2)".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_border_score)
            || !(0.0..=1.0).contains(&self.min_confidence)
        {
            return Err(FiducialError::InvalidParams(
                "scores must be in [0, 1]".into(),
            ));
        }
        if self.max_candidates_per_id == 0 {
            return Err(FiducialError::InvalidParams(
                "max_candidates_per_id must be at least 1".into(),
            ));
        }
        if self.min_side_px.is_nan()
            || self.min_side_px <= 0.0
            || self.max_area_frac.is_nan()
            || self.max_area_frac <= 0.0
        {
            return Err(FiducialError::InvalidParams(
                "min_side_px and max_area_frac must be positive".into(),
            ));
        }
        Ok(())
    }
}
