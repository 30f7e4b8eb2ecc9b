//! High-level facade for the `shapescan-*` workspace.
//!
//! Turns one photo of an object lying on the printed A4 reference sheet into
//! millimeter-accurate outline geometry, serialized as SVG and DXF:
//!
//! 1. [`load`]: decode and normalize the upload,
//! 2. [`fiducial`]: find the four corner markers,
//! 3. [`rectify`]: solve the sheet homography and resample the sheet at a
//!    fixed density,
//! 4. [`scale`]: validate that density against the rectified markers,
//! 5. [`segment`]: learn the sheet's background and extract the object
//!    silhouette,
//! 6. [`vector`]: simplify it in millimeters and write both documents.
//!
//! ## Quickstart
//!
//! ```no_run
//! use shapescan::{ScanConfig, ScanContext, ScanPipeline};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ScanPipeline::new(ScanConfig::default())?;
//! let bytes = std::fs::read("photo.jpg")?;
//! let out = pipeline.run(&bytes, &ScanContext::new("demo"))?;
//! println!("{} rings at {} px/mm", out.contours_count(), out.px_per_mm());
//! shapescan::write_outputs(&out, std::path::Path::new("out"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `shapescan::core`: rasters, homographies, masks, polygons, sheet layout.
//! - `shapescan::fiducial`: marker dictionary, detection, sheet rendering.
//! - `shapescan::segment`: background model, pixel classes, silhouettes.
//! - `shapescan::vector`: vectorizer, SVG and DXF writers and readers.
//! - [`synth`]: deterministic synthetic photos for tests and demos.
//!
//! Lens distortion is not corrected; the sheet is assumed flat and seen
//! through an ideal pinhole camera.

pub use shapescan_core as core;
pub use shapescan_fiducial as fiducial;
pub use shapescan_segment as segment;
pub use shapescan_vector as vector;

mod config;
mod error;
pub mod load;
mod output;
mod pipeline;
pub mod rectify;
pub mod scale;
pub mod synth;

pub use config::{LoadParams, RectifyParams, ScaleParams, ScanConfig};
pub use error::{ConfigError, ErrorKind, ScanError};
pub use load::{load_image, LoadInfo, LoadedImage};
pub use output::{output_file_name, write_atomic, write_outputs, WrittenFiles, OUTPUT_STEM};
pub use pipeline::{
    ScanContext, ScanOutput, ScanPipeline, ScanReport, SilhouetteSummary, Stage,
};
pub use scale::ScaleReport;

pub use shapescan_core::{ScaleFactor, SheetLayout};
pub use shapescan_vector::{VectorFormat, VectorGeometry};
