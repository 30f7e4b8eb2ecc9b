//! Output formats and the writer interface shared by SVG and DXF.

use std::fmt;
use std::io::Write;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use shapescan_core::signed_area;

use crate::error::ExportError;
use crate::geometry::{VectorGeometry, VectorPath};

/// Decimal places written for every coordinate (0.001 mm).
pub const COORD_DECIMALS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorFormat {
    Svg,
    Dxf,
}

impl VectorFormat {
    pub const ALL: [VectorFormat; 2] = [VectorFormat::Svg, VectorFormat::Dxf];

    pub fn extension(self) -> &'static str {
        match self {
            VectorFormat::Svg => "svg",
            VectorFormat::Dxf => "dxf",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            VectorFormat::Svg => "image/svg+xml",
            VectorFormat::Dxf => "image/vnd.dxf",
        }
    }
}

impl fmt::Display for VectorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VectorFormat::Svg => "SVG",
            VectorFormat::Dxf => "DXF",
        })
    }
}

/// Serializes [`VectorGeometry`] into one document format.
pub trait VectorWriter {
    fn format(&self) -> VectorFormat;

    fn write(&self, geometry: &VectorGeometry, out: &mut dyn Write) -> Result<(), ExportError>;

    fn write_to_string(&self, geometry: &VectorGeometry) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        self.write(geometry, &mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| ExportError::parse(self.format(), format!("writer produced invalid UTF-8: {e}")))
    }
}

/// `v` rounded to the written precision.
pub(crate) fn round_coord(v: f64) -> f64 {
    let k = 10f64.powi(COORD_DECIMALS as i32);
    (v * k).round() / k
}

/// Fixed-precision coordinate without a negative zero.
pub(crate) fn fmt_coord(v: f64) -> String {
    let s = format!("{v:.prec$}", prec = COORD_DECIMALS);
    if s.starts_with('-') && s[1..].bytes().all(|b| b == b'0' || b == b'.') {
        s[1..].to_string()
    } else {
        s
    }
}

pub(crate) fn check_finite(geometry: &VectorGeometry) -> Result<(), ExportError> {
    if geometry
        .rings()
        .flatten()
        .any(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(ExportError::NonFinite);
    }
    Ok(())
}

/// Rebuild paths from a flat ring list: a ring with positive area starts a
/// new path, rings with negative area are holes of the current one.
pub(crate) fn group_rings(
    format: VectorFormat,
    rings: Vec<Vec<Point2<f64>>>,
) -> Result<VectorGeometry, ExportError> {
    let mut paths = Vec::new();
    let mut current: Option<(Vec<Point2<f64>>, Vec<Vec<Point2<f64>>>)> = None;
    for ring in rings {
        if ring.len() < 3 {
            return Err(ExportError::parse(format, "ring with fewer than 3 vertices"));
        }
        if signed_area(&ring) > 0.0 {
            if let Some((outer, holes)) = current.take() {
                paths.push(VectorPath::new(outer, holes)?);
            }
            current = Some((ring, Vec::new()));
        } else {
            match current.as_mut() {
                Some((_, holes)) => holes.push(ring),
                None => return Err(ExportError::parse(format, "hole ring before any outer ring")),
            }
        }
    }
    if let Some((outer, holes)) = current {
        paths.push(VectorPath::new(outer, holes)?);
    }
    if paths.is_empty() {
        return Err(ExportError::Empty { format });
    }
    Ok(VectorGeometry::new(paths)?)
}
