//! Object segmentation on a rectified canvas.

use nalgebra::Point2;
use serde::Serialize;
use shapescan_core::{Mask, RgbImage, ScaleFactor, SheetLayout};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::background::{estimate_background, BackgroundModel};
use crate::classify::{classify_pixels, exclusion_mask, PixelClass};
use crate::error::{NoObjectReason, SegmentError};
use crate::morphology::{clean_mask, radius_px};
use crate::params::SegmentParams;
use crate::regions::{judge_region, select_region, summarize_regions, RegionVerdict};
use crate::silhouette::{silhouette_from_region, Silhouette};

/// Pixel and region counts of one segmentation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SegmentStats {
    pub foreground_px: usize,
    pub ambiguous_px: usize,
    pub regions: usize,
    pub accepted_regions: usize,
}

#[derive(Clone, Debug)]
pub struct Segmentation {
    pub silhouette: Silhouette,
    pub background: BackgroundModel,
    pub stats: SegmentStats,
}

#[derive(Clone, Debug)]
pub struct ObjectSegmenter {
    params: SegmentParams,
    layout: SheetLayout,
}

impl ObjectSegmenter {
    pub fn new(params: SegmentParams, layout: SheetLayout) -> Result<Self, SegmentError> {
        params.validate()?;
        layout.validate()?;
        Ok(Self { params, layout })
    }

    #[inline]
    pub fn params(&self) -> &SegmentParams {
        &self.params
    }

    /// Segment the object on `canvas`, a rectified image of the whole sheet
    /// at `scale`. `coverage` marks canvas pixels that came from the photo.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, canvas, coverage),
            fields(width = canvas.width(), height = canvas.height(), px_per_mm = scale.px_per_mm())
        )
    )]
    pub fn segment(
        &self,
        canvas: &RgbImage,
        coverage: &Mask,
        scale: ScaleFactor,
    ) -> Result<Segmentation, SegmentError> {
        let p = &self.params;
        if (canvas.width(), canvas.height()) != (coverage.width, coverage.height) {
            return Err(SegmentError::SizeMismatch {
                canvas: (canvas.width(), canvas.height()),
                coverage: (coverage.width, coverage.height),
            });
        }

        let background = estimate_background(canvas, coverage, &self.layout, scale, p)?;
        let excluded = exclusion_mask(coverage, &self.layout, scale, p);
        let classes = classify_pixels(canvas, &excluded, &background, scale, p);

        let mut stats = SegmentStats {
            foreground_px: classes.count(PixelClass::Foreground),
            ambiguous_px: classes.count(PixelClass::Ambiguous),
            ..SegmentStats::default()
        };

        let d = scale.px_per_mm();
        let cleaned = clean_mask(
            &classes.candidate_mask(),
            radius_px(p.open_radius_mm, d),
            radius_px(p.close_radius_mm, d),
            &excluded,
        );
        let (comps, regions) = summarize_regions(&cleaned, &classes);
        stats.regions = regions.len();

        let min_area_px = p.min_object_area_mm2 * d * d;
        let accepted: Vec<_> = regions
            .iter()
            .filter(|r| judge_region(r, min_area_px, p.min_foreground_share) == RegionVerdict::Accepted)
            .collect();
        stats.accepted_regions = accepted.len();
        log::debug!(
            "segmentation: {} foreground px, {} ambiguous px, {} regions, {} accepted",
            stats.foreground_px,
            stats.ambiguous_px,
            stats.regions,
            stats.accepted_regions
        );

        let center = Point2::new(0.5 * canvas.width() as f64, 0.5 * canvas.height() as f64);
        let Some(region) = select_region(accepted.iter().copied(), center) else {
            return Err(SegmentError::NoObjectDetected(NoObjectReason::NoRegion {
                candidates: stats.regions,
            }));
        };

        let min_hole_px = p.min_hole_area_mm2 * d * d;
        let too_small = |area_px: f64| {
            SegmentError::NoObjectDetected(NoObjectReason::TooSmall {
                area_mm2: scale.area_px_to_mm2(area_px),
                min_mm2: p.min_object_area_mm2,
            })
        };
        let silhouette = silhouette_from_region(&comps, &comps.stats[region.index], min_hole_px)
            .ok_or_else(|| too_small(0.0))?;
        if silhouette.outer_area_px() < min_area_px {
            return Err(too_small(silhouette.outer_area_px()));
        }

        log::info!(
            "object silhouette: {:.1} mm², {} ring(s), {} pinhole(s) filled",
            scale.area_px_to_mm2(silhouette.area_px()),
            silhouette.ring_count(),
            silhouette.filled_holes()
        );
        Ok(Segmentation {
            silhouette,
            background,
            stats,
        })
    }
}
