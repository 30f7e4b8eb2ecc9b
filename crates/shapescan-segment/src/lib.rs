//! Object silhouette extraction from a rectified reference-sheet canvas.
//!
//! The sheet's own color is learned per image from margin patches; pixels
//! are then tagged [`PixelClass::Background`], [`PixelClass::Foreground`] or
//! [`PixelClass::Ambiguous`], cleaned morphologically and grouped into
//! regions. One policy function, [`judge_region`], decides which regions can
//! be the object, and the largest accepted region is traced into a
//! [`Silhouette`].

mod background;
mod classify;
mod error;
mod morphology;
mod params;
mod regions;
mod segmenter;
mod silhouette;

pub use background::{estimate_background, patch_centers, BackgroundModel, PatchSample};
pub use classify::{classify_pixels, classify_z, exclusion_mask, ClassMap, PixelClass};
pub use error::{NoObjectReason, SegmentError};
pub use morphology::{clean_mask, radius_px};
pub use params::SegmentParams;
pub use regions::{judge_region, select_region, summarize_regions, RegionSummary, RegionVerdict};
pub use segmenter::{ObjectSegmenter, SegmentStats, Segmentation};
pub use silhouette::{silhouette_from_region, Silhouette};
