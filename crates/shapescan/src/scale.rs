//! Scale resolution and its consistency check.
//!
//! The canvas density is fixed by configuration, so the scale is known before
//! any measurement. What is checked here is that the rectification really
//! produced that density. The four marker centers are mapped into the canvas
//! and their pairwise distances compared with the printed ones; the homography
//! is fitted to those centers, so this mostly catches numerical failure. The
//! decoded marker outlines are not part of the fit: their corners are mapped
//! as well and the mean side length is compared with the printed marker size.

use serde::Serialize;
use shapescan_core::{perimeter, ProjectiveMap, ScaleFactor, SheetLayout};
use shapescan_fiducial::MarkerSet;

use crate::config::ScaleParams;
use crate::error::ScanError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScaleReport {
    /// The scale attached to every output; equal to the configured density.
    pub scale: ScaleFactor,
    /// Mean density between rectified marker centers.
    pub measured_px_per_mm: f64,
    /// Largest relative deviation of any marker pair from the configured density.
    pub deviation: f64,
    /// Density along the rectified marker outlines.
    pub outline_px_per_mm: f64,
    /// Relative deviation of `outline_px_per_mm` from the configured density.
    pub outline_deviation: f64,
    /// Photo pixels per millimeter along the detected marker outlines.
    pub photo_px_per_mm: f64,
}

pub fn resolve_scale(
    markers: &MarkerSet,
    map: &ProjectiveMap,
    layout: &SheetLayout,
    px_per_mm: f64,
    params: &ScaleParams,
) -> Result<ScaleReport, ScanError> {
    let scale = ScaleFactor::new(px_per_mm, &params.bounds)?;

    let known = layout.marker_centers();
    let canvas = markers
        .points()
        .map(|p| scale.mm_to_px(map.inverse().apply(p)));

    let mut ratios = Vec::with_capacity(6);
    for i in 0..4 {
        for j in i + 1..4 {
            let mm = (known[i] - known[j]).norm();
            ratios.push((canvas[i] - canvas[j]).norm() / mm);
        }
    }
    let measured = ratios.iter().sum::<f64>() / ratios.len() as f64;
    let deviation = ratios
        .iter()
        .map(|r| (r / px_per_mm - 1.0).abs())
        .fold(0.0_f64, f64::max);
    if !deviation.is_finite() || deviation > params.max_deviation {
        return Err(ScanError::ImplausibleScale(format!(
            "rectified markers measure {measured:.4} px/mm against {px_per_mm} px/mm \
             (deviation {:.3}%, limit {:.3}%)",
            deviation * 100.0,
            params.max_deviation * 100.0
        )));
    }

    let printed_outline = 16.0 * layout.marker_size_mm;
    let rectified_outline: f64 = markers
        .markers()
        .iter()
        .map(|m| perimeter(&m.corners.map(|p| scale.mm_to_px(map.inverse().apply(p)))))
        .sum();
    let outline_px_per_mm = rectified_outline / printed_outline;
    let outline_deviation = (outline_px_per_mm / px_per_mm - 1.0).abs();
    if !outline_deviation.is_finite() || outline_deviation > params.max_outline_deviation {
        return Err(ScanError::ImplausibleScale(format!(
            "rectified marker outlines measure {outline_px_per_mm:.4} px/mm against \
             {px_per_mm} px/mm (deviation {:.2}%, limit {:.2}%)",
            outline_deviation * 100.0,
            params.max_outline_deviation * 100.0
        )));
    }

    let outline: f64 = markers
        .markers()
        .iter()
        .map(|m| perimeter(&m.corners))
        .sum();
    let photo_px_per_mm = outline / printed_outline;
    if photo_px_per_mm < 0.25 * px_per_mm {
        log::warn!(
            "photo resolves {photo_px_per_mm:.2} px/mm at the markers; \
             the {px_per_mm} px/mm canvas is heavily upsampled"
        );
    }
    log::debug!(
        "scale {px_per_mm} px/mm, centers {measured:.4} (deviation {:.4}%), \
         outlines {outline_px_per_mm:.4}, photo {photo_px_per_mm:.2} px/mm",
        deviation * 100.0
    );

    Ok(ScaleReport {
        scale,
        measured_px_per_mm: measured,
        deviation,
        outline_px_per_mm,
        outline_deviation,
        photo_px_per_mm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point2, Vector2};
    use shapescan_core::{Homography, HomographyTolerance, SheetCorner};
    use shapescan_fiducial::DetectedMarker;

    use crate::error::ErrorKind;

    fn markers_at(centers: [Point2<f64>; 4], side_px: f64, layout: &SheetLayout) -> MarkerSet {
        let h = side_px / 2.0;
        let ms = SheetCorner::ALL.map(|c| {
            let p = centers[c.index()];
            DetectedMarker {
                id: layout.marker_id(c),
                center: p,
                corners: [
                    p + Vector2::new(-h, -h),
                    p + Vector2::new(h, -h),
                    p + Vector2::new(h, h),
                    p + Vector2::new(-h, h),
                ],
                confidence: 1.0,
                rotation: 0,
                hamming: 0,
            }
        });
        MarkerSet::new(ms, 8.0, 1e-3).unwrap()
    }

    #[test]
    fn consistent_rectification_passes() {
        let layout = SheetLayout::a4_v1();
        let photo = Homography::scaling(4.0);
        let centers = layout.marker_centers().map(|p| photo.apply(p));
        let markers = markers_at(centers, 120.0, &layout);
        let map = ProjectiveMap::from_correspondences(
            &layout.marker_centers(),
            &centers,
            &HomographyTolerance::default(),
        )
        .unwrap();

        let r = resolve_scale(&markers, &map, &layout, 10.0, &ScaleParams::default()).unwrap();
        assert_eq!(r.scale.px_per_mm(), 10.0);
        assert!(r.deviation < 1e-9);
        approx::assert_relative_eq!(r.measured_px_per_mm, 10.0, epsilon = 1e-9);
        approx::assert_relative_eq!(r.photo_px_per_mm, 4.0, epsilon = 1e-9);
        approx::assert_relative_eq!(r.outline_px_per_mm, 10.0, epsilon = 1e-9);
        assert!(r.outline_deviation < 1e-9);
    }

    #[test]
    fn wrong_marker_size_is_implausible() {
        let layout = SheetLayout::a4_v1();
        let photo = Homography::scaling(4.0);
        let centers = layout.marker_centers().map(|p| photo.apply(p));
        let map = ProjectiveMap::from_correspondences(
            &layout.marker_centers(),
            &centers,
            &HomographyTolerance::default(),
        )
        .unwrap();

        // centers agree with the fit; the outlines say the markers are 20% larger
        let markers = markers_at(centers, 144.0, &layout);
        let err = resolve_scale(&markers, &map, &layout, 10.0, &ScaleParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImplausibleScale);
        assert!(err.to_string().contains("outlines"), "{err}");

        // a small localization error on the corners stays within bounds
        let markers = markers_at(centers, 121.0, &layout);
        let r = resolve_scale(&markers, &map, &layout, 10.0, &ScaleParams::default()).unwrap();
        assert!(r.deviation < 1e-9);
        approx::assert_relative_eq!(r.outline_deviation, 1.0 / 120.0, epsilon = 1e-9);
    }

    #[test]
    fn inconsistent_map_is_implausible() {
        let layout = SheetLayout::a4_v1();
        let centers = layout.marker_centers().map(|p| Homography::scaling(4.0).apply(p));
        let markers = markers_at(centers, 120.0, &layout);
        // map solved for a sheet photographed 2% larger
        let other = layout
            .marker_centers()
            .map(|p| Homography::scaling(4.08).apply(p));
        let map = ProjectiveMap::from_correspondences(
            &layout.marker_centers(),
            &other,
            &HomographyTolerance::default(),
        )
        .unwrap();

        let err = resolve_scale(&markers, &map, &layout, 10.0, &ScaleParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImplausibleScale);
    }

    #[test]
    fn out_of_bounds_density_is_implausible() {
        let layout = SheetLayout::a4_v1();
        let centers = layout.marker_centers().map(|p| Homography::scaling(4.0).apply(p));
        let markers = markers_at(centers, 120.0, &layout);
        let map = ProjectiveMap::from_correspondences(
            &layout.marker_centers(),
            &centers,
            &HomographyTolerance::default(),
        )
        .unwrap();
        for d in [0.0, f64::NAN, 120.0] {
            let err = resolve_scale(&markers, &map, &layout, d, &ScaleParams::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ImplausibleScale, "{d}");
        }
    }
}
