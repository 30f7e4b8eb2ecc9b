//! Corner fiducials of the printed reference sheet.
//!
//! Detection runs in four stages:
//!
//! 1. adaptive thresholding at a few window sizes,
//! 2. quadrilateral candidates from dark connected components,
//! 3. per-quad decoding of the 4×4 code against [`SHEET_4X4_V1`],
//! 4. assignment of decoded markers to the sheet corners.
//!
//! ```no_run
//! use shapescan_core::{RgbImage, SheetLayout};
//! use shapescan_fiducial::{FiducialDetector, FiducialParams};
//!
//! # fn run(photo: &RgbImage) -> Result<(), shapescan_fiducial::FiducialError> {
//! let det = FiducialDetector::new(FiducialParams::default(), SheetLayout::a4_v1())?;
//! let found = det.detect(photo)?;
//! for (corner, m) in found.markers.iter() {
//!     println!("{corner:?}: id {} at {:?}", m.id, m.center);
//! }
//! # Ok(())
//! # }
//! ```

mod candidates;
mod decode;
mod detector;
mod dictionary;
mod error;
mod matcher;
mod params;
mod render;
mod select;
mod threshold;

pub use candidates::Quad;
pub use decode::MarkerCandidate;
pub use detector::{FiducialDetection, FiducialDetector};
pub use dictionary::{Dictionary, SHEET_4X4_V1};
pub use error::FiducialError;
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use params::FiducialParams;
pub use render::{marker_cells, render_sheet};
pub use select::{DetectedMarker, MarkerSet};
