//! ASCII DXF R12 for CAD and CNC interchange.
//!
//! DXF is y-up. Rings are written with `y_dxf = (min_y + max_y) - y`, which
//! keeps the drawing unmirrored and its extents unchanged; the reader applies
//! the same flip.

use std::io::Write;

use nalgebra::Point2;

use crate::error::ExportError;
use crate::format::{check_finite, fmt_coord, group_rings, VectorFormat, VectorWriter};
use crate::geometry::VectorGeometry;

pub const OUTLINE_LAYER: &str = "OUTLINE";

#[derive(Clone, Copy, Debug, Default)]
pub struct DxfWriter;

fn pair(out: &mut dyn Write, code: i32, value: &str) -> std::io::Result<()> {
    writeln!(out, "{code:>3}")?;
    writeln!(out, "{value}")
}

impl VectorWriter for DxfWriter {
    fn format(&self) -> VectorFormat {
        VectorFormat::Dxf
    }

    fn write(&self, geometry: &VectorGeometry, out: &mut dyn Write) -> Result<(), ExportError> {
        check_finite(geometry)?;
        let b = geometry.bounds();
        let flip = b.min_y + b.max_y;

        pair(out, 0, "SECTION")?;
        pair(out, 2, "HEADER")?;
        pair(out, 9, "$ACADVER")?;
        pair(out, 1, "AC1009")?;
        pair(out, 9, "$INSUNITS")?;
        pair(out, 70, "4")?;
        pair(out, 9, "$MEASUREMENT")?;
        pair(out, 70, "1")?;
        pair(out, 9, "$EXTMIN")?;
        pair(out, 10, &fmt_coord(b.min_x))?;
        pair(out, 20, &fmt_coord(b.min_y))?;
        pair(out, 9, "$EXTMAX")?;
        pair(out, 10, &fmt_coord(b.max_x))?;
        pair(out, 20, &fmt_coord(b.max_y))?;
        pair(out, 0, "ENDSEC")?;

        pair(out, 0, "SECTION")?;
        pair(out, 2, "TABLES")?;
        pair(out, 0, "TABLE")?;
        pair(out, 2, "LAYER")?;
        pair(out, 70, "1")?;
        pair(out, 0, "LAYER")?;
        pair(out, 2, OUTLINE_LAYER)?;
        pair(out, 70, "0")?;
        pair(out, 62, "7")?;
        pair(out, 6, "CONTINUOUS")?;
        pair(out, 0, "ENDTAB")?;
        pair(out, 0, "ENDSEC")?;

        pair(out, 0, "SECTION")?;
        pair(out, 2, "ENTITIES")?;
        for ring in geometry.rings() {
            pair(out, 0, "POLYLINE")?;
            pair(out, 8, OUTLINE_LAYER)?;
            pair(out, 66, "1")?;
            pair(out, 10, "0.0")?;
            pair(out, 20, "0.0")?;
            pair(out, 30, "0.0")?;
            pair(out, 70, "1")?;
            for p in ring {
                pair(out, 0, "VERTEX")?;
                pair(out, 8, OUTLINE_LAYER)?;
                pair(out, 10, &fmt_coord(p.x))?;
                pair(out, 20, &fmt_coord(flip - p.y))?;
                pair(out, 30, "0.0")?;
            }
            pair(out, 0, "SEQEND")?;
            pair(out, 8, OUTLINE_LAYER)?;
        }
        pair(out, 0, "ENDSEC")?;
        pair(out, 0, "EOF")?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Section {
    None,
    Header,
    Entities,
    Other,
}

#[derive(Default)]
struct Extents {
    min_y: Option<f64>,
    max_y: Option<f64>,
}

/// Parse a DXF document back into page-oriented geometry.
///
/// Closed `POLYLINE`/`VERTEX`/`SEQEND` sequences and closed `LWPOLYLINE`
/// entities are read; other entities are ignored.
pub fn read_dxf(doc: &str) -> Result<VectorGeometry, ExportError> {
    let err = |line: usize, msg: &str| ExportError::parse(VectorFormat::Dxf, format!("line {line}: {msg}"));

    let lines: Vec<&str> = doc.lines().map(str::trim).collect();
    let mut pairs = Vec::with_capacity(lines.len() / 2);
    for (i, chunk) in lines.chunks(2).enumerate() {
        if chunk.len() < 2 {
            if chunk[0].is_empty() {
                break;
            }
            return Err(err(2 * i + 1, "group code without value"));
        }
        let code: i32 = chunk[0]
            .parse()
            .map_err(|_| err(2 * i + 1, "group code is not an integer"))?;
        pairs.push((2 * i + 1, code, chunk[1]));
    }

    let num = |line: usize, v: &str| -> Result<f64, ExportError> {
        v.parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .ok_or_else(|| err(line + 1, "expected a number"))
    };

    let mut section = Section::None;
    let mut header_var = "";
    let mut ext = Extents::default();
    let mut rings: Vec<(Vec<Point2<f64>>, bool)> = Vec::new();
    // entity being read: (kind, points, closed, pending x)
    let mut entity: Option<(&str, Vec<Point2<f64>>, bool, Option<f64>)> = None;
    let mut in_polyline = false;

    for &(line, code, value) in &pairs {
        if code == 0 {
            if let Some((kind, pts, closed, _)) = entity.take() {
                match kind {
                    "LWPOLYLINE" => rings.push((pts, closed)),
                    "VERTEX" => {
                        if let Some((ring, _)) = rings.last_mut().filter(|_| in_polyline) {
                            ring.extend(pts);
                        }
                    }
                    "POLYLINE" => {
                        rings.push((Vec::new(), closed));
                        in_polyline = true;
                    }
                    _ => {}
                }
            }
            match value {
                "SECTION" => section = Section::Other,
                "ENDSEC" => section = Section::None,
                "EOF" => break,
                "SEQEND" => in_polyline = false,
                "POLYLINE" | "VERTEX" | "LWPOLYLINE" if section == Section::Entities => {
                    if value == "VERTEX" && !in_polyline {
                        return Err(err(line, "VERTEX outside POLYLINE"));
                    }
                    entity = Some((value, Vec::new(), false, None));
                }
                _ => {}
            }
            continue;
        }

        if code == 2 && section == Section::Other && entity.is_none() {
            section = match value {
                "HEADER" => Section::Header,
                "ENTITIES" => Section::Entities,
                _ => Section::Other,
            };
            continue;
        }

        match section {
            Section::Header => match code {
                9 => header_var = value,
                20 if header_var == "$EXTMIN" => ext.min_y = Some(num(line, value)?),
                20 if header_var == "$EXTMAX" => ext.max_y = Some(num(line, value)?),
                _ => {}
            },
            Section::Entities => {
                let Some((kind, pts, closed, pending_x)) = entity.as_mut() else {
                    continue;
                };
                match code {
                    10 if *kind != "POLYLINE" => *pending_x = Some(num(line, value)?),
                    20 if *kind != "POLYLINE" => {
                        let x = pending_x.take().ok_or_else(|| err(line, "y before x"))?;
                        pts.push(Point2::new(x, num(line, value)?));
                    }
                    70 => {
                        let flags: i32 = value.parse().map_err(|_| err(line + 1, "bad flags"))?;
                        *closed = flags & 1 == 1;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    let closed: Vec<Vec<Point2<f64>>> = rings
        .into_iter()
        .filter_map(|(r, closed)| closed.then_some(r))
        .collect();
    let flip = match (ext.min_y, ext.max_y) {
        (Some(a), Some(b)) => a + b,
        _ => {
            let ys = closed.iter().flatten().map(|p| p.y);
            let (lo, hi) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
                (lo.min(y), hi.max(y))
            });
            if lo.is_finite() {
                lo + hi
            } else {
                0.0
            }
        }
    };
    let rings = closed
        .into_iter()
        .map(|r| r.into_iter().map(|p| Point2::new(p.x, flip - p.y)).collect())
        .collect();
    group_rings(VectorFormat::Dxf, rings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::VectorPath;

    fn l_shape() -> VectorGeometry {
        let outer = vec![
            Point2::new(10.0, 5.0),
            Point2::new(40.0, 5.0),
            Point2::new(40.0, 15.0),
            Point2::new(20.0, 15.0),
            Point2::new(20.0, 35.0),
            Point2::new(10.0, 35.0),
        ];
        VectorGeometry::new(vec![VectorPath::new(outer, vec![]).unwrap()]).unwrap()
    }

    #[test]
    fn header_and_entities() {
        let s = DxfWriter.write_to_string(&l_shape()).unwrap();
        assert!(s.contains("AC1009"));
        assert!(s.contains("$INSUNITS\n 70\n4\n"));
        assert_eq!(s.matches("POLYLINE").count(), 1);
        assert_eq!(s.matches("VERTEX").count(), 6);
        assert!(s.trim_end().ends_with("EOF"));
        // top-left of the page is the highest point in y-up space
        assert!(s.contains(" 10\n10.000\n 20\n35.000\n"));
    }

    #[test]
    fn reads_what_it_writes() {
        let g = l_shape();
        let back = read_dxf(&DxfWriter.write_to_string(&g).unwrap()).unwrap();
        assert!(back.approx_eq(&g, 1e-9));
    }

    #[test]
    fn reads_lwpolyline_and_odd_whitespace() {
        let doc = "0\r\nSECTION\r\n  2\r\nENTITIES\r\n0\r\nLWPOLYLINE\r\n 8\r\n0\r\n 90\r\n4\r\n70\r\n     1\r\n\
                   10\r\n0\r\n20\r\n0\r\n10\r\n0\r\n20\r\n4\r\n10\r\n6\r\n20\r\n4\r\n10\r\n6\r\n20\r\n0\r\n\
                   0\r\nENDSEC\r\n0\r\nEOF\r\n";
        let g = read_dxf(doc).unwrap();
        assert_eq!(g.paths().len(), 1);
        assert_eq!(g.width(), 6.0);
        assert_eq!(g.height(), 4.0);
    }

    #[test]
    fn open_polylines_are_ignored() {
        let doc = "0\nSECTION\n2\nENTITIES\n0\nLWPOLYLINE\n70\n0\n10\n0\n20\n0\n10\n1\n20\n1\n10\n2\n20\n0\n0\nENDSEC\n0\nEOF\n";
        assert!(matches!(read_dxf(doc), Err(ExportError::Empty { .. })));
    }
}
