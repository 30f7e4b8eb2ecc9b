//! Perspective correction of the photo onto the sheet's millimeter grid.

use shapescan_core::{
    warp_perspective_rgb, Homography, HomographyError, HomographyTolerance, Mask, ProjectiveMap,
    RgbImage, SheetLayout,
};
use shapescan_fiducial::MarkerSet;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// The whole sheet resampled at a fixed density.
#[derive(Clone, Debug)]
pub struct Rectified {
    pub canvas: RgbImage,
    /// Canvas pixels that sampled inside the photo.
    pub coverage: Mask,
    pub px_per_mm: f64,
}

/// Solve the map from sheet millimeters to photo pixels through the four
/// marker centers.
pub fn sheet_to_photo(
    markers: &MarkerSet,
    layout: &SheetLayout,
    tol: &HomographyTolerance,
) -> Result<ProjectiveMap, HomographyError> {
    ProjectiveMap::from_correspondences(&layout.marker_centers(), &markers.points(), tol)
}

/// Canvas size for the full sheet at `px_per_mm`.
pub fn canvas_size(layout: &SheetLayout, px_per_mm: f64) -> (usize, usize) {
    (
        (layout.width_mm * px_per_mm).round() as usize,
        (layout.height_mm * px_per_mm).round() as usize,
    )
}

/// Resample `photo` into the sheet canvas.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(photo, map, layout), fields(px_per_mm = px_per_mm))
)]
pub fn rectify(
    photo: &RgbImage,
    map: &ProjectiveMap,
    layout: &SheetLayout,
    px_per_mm: f64,
) -> Rectified {
    let (w, h) = canvas_size(layout, px_per_mm);
    let photo_from_canvas = map
        .forward()
        .compose(&Homography::scaling(1.0 / px_per_mm));
    let warped = warp_perspective_rgb(&photo.view(), &photo_from_canvas, w, h);
    log::debug!(
        "rectified {}x{} photo into {w}x{h} canvas, {} px covered",
        photo.width(),
        photo.height(),
        warped.coverage.count()
    );
    Rectified {
        canvas: warped.image,
        coverage: warped.coverage,
        px_per_mm,
    }
}
