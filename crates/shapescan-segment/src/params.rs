use serde::{Deserialize, Serialize};

use crate::error::SegmentError;

/// Object segmentation parameters. Lengths are in sheet millimeters and
/// converted with the canvas scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    /// Band along the sheet edges that never belongs to the object.
    pub border_mm: f64,
    /// Growth of each marker square for its exclusion zone.
    pub marker_padding_mm: f64,
    /// Side of a background sampling patch.
    pub patch_mm: f64,
    /// Patches per sheet side, spaced between the corner markers.
    pub patches_per_side: usize,
    /// Minimum surviving patches for a usable background model.
    pub min_patches: usize,
    /// Patches whose luminance is further than this many robust deviations
    /// from the median patch are dropped.
    pub patch_outlier_sigma: f64,
    /// Floor of the robust spread between patch luminances, in gray levels.
    pub patch_spread_floor: f64,
    /// Floor of the per-channel background deviation, in gray levels.
    pub sigma_floor: f64,
    /// Normalized distance at or below which a pixel is background.
    pub background_z: f64,
    /// Normalized distance at or above which a pixel is foreground.
    pub foreground_z: f64,
    pub open_radius_mm: f64,
    pub close_radius_mm: f64,
    /// Minimum share of strict foreground pixels in an accepted region.
    pub min_foreground_share: f64,
    pub min_object_area_mm2: f64,
    /// Holes below this area are filled.
    pub min_hole_area_mm2: f64,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            border_mm: 5.0,
            marker_padding_mm: 5.0,
            patch_mm: 10.0,
            patches_per_side: 3,
            min_patches: 4,
            patch_outlier_sigma: 4.0,
            patch_spread_floor: 6.0,
            sigma_floor: 4.0,
            background_z: 3.0,
            foreground_z: 6.0,
            open_radius_mm: 0.3,
            close_radius_mm: 0.5,
            min_foreground_share: 0.5,
            min_object_area_mm2: 100.0,
            min_hole_area_mm2: 4.0,
        }
    }
}

impl SegmentParams {
    pub fn validate(&self) -> Result<(), SegmentError> {
        let lengths = [
            ("border_mm", self.border_mm),
            ("marker_padding_mm", self.marker_padding_mm),
            ("open_radius_mm", self.open_radius_mm),
            ("close_radius_mm", self.close_radius_mm),
            ("min_hole_area_mm2", self.min_hole_area_mm2),
        ];
        for (name, v) in lengths {
            if !v.is_finite() || v < 0.0 {
                return Err(SegmentError::InvalidParams(format!(
                    "{name} must be finite and non-negative, got {v}"
                )));
            }
        }
        let positive = [
            ("patch_mm", self.patch_mm),
            ("patch_outlier_sigma", self.patch_outlier_sigma),
            ("patch_spread_floor", self.patch_spread_floor),
            ("sigma_floor", self.sigma_floor),
            ("background_z", self.background_z),
            ("min_object_area_mm2", self.min_object_area_mm2),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(SegmentError::InvalidParams(format!(
                    "{name} must be positive, got {v}"
                )));
            }
        }
        if !self.foreground_z.is_finite() || self.foreground_z < self.background_z {
            return Err(SegmentError::InvalidParams(
                "foreground_z must be at least background_z".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_foreground_share) {
            return Err(SegmentError::InvalidParams(
                "min_foreground_share must be in [0, 1]".into(),
            ));
        }
        if self.patches_per_side == 0 || self.min_patches < 3 {
            return Err(SegmentError::InvalidParams(
                "need at least one patch per side and min_patches >= 3".into(),
            ));
        }
        if self.min_patches > 4 * self.patches_per_side {
            return Err(SegmentError::InvalidParams(format!(
                "min_patches {} exceeds the {} patches placed",
                self.min_patches,
                4 * self.patches_per_side
            )));
        }
        Ok(())
    }
}
