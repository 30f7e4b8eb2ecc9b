//! Geometry and raster core for photo-to-vector rectification.
//!
//! This crate is purely geometric and holds no global state: owned RGB/gray
//! rasters, homographies, a row-pure perspective warp, binary masks with
//! connected components and pixel-edge boundary tracing, polygon utilities,
//! the printed reference sheet layout and the validated [`ScaleFactor`].

mod homography;
mod image;
mod logger;
mod mask;
mod polygon;
mod scale;
mod sheet;
mod trace;
mod warp;

pub use homography::{
    homography_from_4pt, solve_4pt, FourPointSolution, Homography, HomographyError,
    HomographyTolerance, ProjectiveMap,
};
pub use image::{
    luma, sample_bilinear, sample_bilinear_rgb, GrayImage, GrayImageView, RgbImage, RgbImageView,
};
pub use mask::{label_components, ComponentStats, Components, Connectivity, Mask};
pub use polygon::{
    collinearity_ratio, has_crossings, is_convex, is_simple, min_pairwise_distance, perimeter,
    point_in_ring, segments_intersect, signed_area, simplify_closed, Bounds,
};
pub use scale::{ScaleBounds, ScaleError, ScaleFactor};
pub use sheet::{SheetCorner, SheetLayout, SheetLayoutError, MARKER_BITS, MARKER_CELLS};
pub use trace::trace_boundaries;
pub use warp::{warp_perspective_rgb, Warped};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{default_directive, init_with_level, is_pipeline_target, PIPELINE_CRATES};
