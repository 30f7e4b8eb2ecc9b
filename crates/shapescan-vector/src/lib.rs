//! Millimeter vector geometry from object silhouettes, and its SVG and DXF
//! documents.
//!
//! ```no_run
//! use shapescan_core::ScaleFactor;
//! use shapescan_segment::Silhouette;
//! use shapescan_vector::{DxfWriter, SvgWriter, VectorWriter, Vectorizer, VectorizeParams};
//!
//! # fn run(silhouette: &Silhouette, scale: ScaleFactor) -> Result<(), Box<dyn std::error::Error>> {
//! let geometry = Vectorizer::new(VectorizeParams::default())?.vectorize(silhouette, scale)?;
//! let svg = SvgWriter.write_to_string(&geometry)?;
//! let dxf = DxfWriter.write_to_string(&geometry)?;
//! # let _ = (svg, dxf);
//! # Ok(())
//! # }
//! ```

mod dxf;
mod error;
mod format;
mod geometry;
mod svg;
mod vectorize;

pub use dxf::{read_dxf, DxfWriter, OUTLINE_LAYER};
pub use error::{ExportError, VectorizeError};
pub use format::{VectorFormat, VectorWriter, COORD_DECIMALS};
pub use geometry::{VectorGeometry, VectorPath};
pub use svg::{read_svg, SvgWriter};
pub use vectorize::{Anchor, VectorizeParams, Vectorizer};

/// Writer for `format`.
pub fn writer_for(format: VectorFormat) -> Box<dyn VectorWriter + Send + Sync> {
    match format {
        VectorFormat::Svg => Box::new(SvgWriter),
        VectorFormat::Dxf => Box::new(DxfWriter),
    }
}

/// Parse a document of `format` back into geometry.
pub fn read_document(format: VectorFormat, doc: &str) -> Result<VectorGeometry, ExportError> {
    match format {
        VectorFormat::Svg => read_svg(doc),
        VectorFormat::Dxf => read_dxf(doc),
    }
}
