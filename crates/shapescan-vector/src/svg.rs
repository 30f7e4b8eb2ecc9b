//! SVG documents for rendering and laser workflows.
//!
//! The page is sized in millimeters with a `viewBox` equal to the geometry
//! bounds, so one user unit is one millimeter. Each path is a single
//! `<path>` with one `M … L … Z` subpath per ring.

use std::io::Write;

use nalgebra::Point2;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::ExportError;
use crate::format::{
    check_finite, fmt_coord, group_rings, round_coord, VectorFormat, VectorWriter,
};
use crate::geometry::{VectorGeometry, VectorPath};

const SVG_NS: &str = "http://www.w3.org/2000/svg";

#[derive(Clone, Copy, Debug, Default)]
pub struct SvgWriter;

fn xml_err(e: impl std::fmt::Display) -> ExportError {
    ExportError::parse(VectorFormat::Svg, format!("xml: {e}"))
}

/// `d` attribute of one path.
fn path_data(path: &VectorPath) -> String {
    let mut d = String::new();
    for ring in path.rings() {
        for (i, p) in ring.iter().enumerate() {
            if !d.is_empty() {
                d.push(' ');
            }
            d.push_str(if i == 0 { "M " } else { "L " });
            d.push_str(&fmt_coord(p.x));
            d.push(',');
            d.push_str(&fmt_coord(p.y));
        }
        d.push_str(" Z");
    }
    d
}

impl VectorWriter for SvgWriter {
    fn format(&self) -> VectorFormat {
        VectorFormat::Svg
    }

    fn write(&self, geometry: &VectorGeometry, out: &mut dyn Write) -> Result<(), ExportError> {
        check_finite(geometry)?;
        let b = geometry.bounds();
        let mut w = Writer::new_with_indent(out, b' ', 2);

        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;

        // extents from the rounded corners, as the path data is written
        let (x0, x1) = (round_coord(b.min_x), round_coord(b.max_x));
        let (y0, y1) = (round_coord(b.min_y), round_coord(b.max_y));
        let (width_mm, height_mm) = (fmt_coord(x1 - x0), fmt_coord(y1 - y0));
        let width = format!("{width_mm}mm");
        let height = format!("{height_mm}mm");
        let view_box = format!(
            "{} {} {width_mm} {height_mm}",
            fmt_coord(x0),
            fmt_coord(y0)
        );
        let mut svg = BytesStart::new("svg");
        svg.push_attribute(("xmlns", SVG_NS));
        svg.push_attribute(("version", "1.1"));
        svg.push_attribute(("width", width.as_str()));
        svg.push_attribute(("height", height.as_str()));
        svg.push_attribute(("viewBox", view_box.as_str()));
        w.write_event(Event::Start(svg)).map_err(xml_err)?;

        for path in geometry.paths() {
            let d = path_data(path);
            let mut el = BytesStart::new("path");
            el.push_attribute(("d", d.as_str()));
            el.push_attribute(("fill", "none"));
            el.push_attribute(("stroke", "black"));
            el.push_attribute(("stroke-width", "0.1"));
            el.push_attribute(("fill-rule", "evenodd"));
            w.write_event(Event::Empty(el)).map_err(xml_err)?;
        }

        w.write_event(Event::End(BytesEnd::new("svg"))).map_err(xml_err)?;
        w.into_inner().write_all(b"\n")?;
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Cmd(char),
    Num(f64),
}

fn tokenize(d: &str) -> Result<Vec<Token>, ExportError> {
    let mut out = Vec::new();
    let mut num = String::new();
    let flush = |num: &mut String, out: &mut Vec<Token>| -> Result<(), ExportError> {
        if !num.is_empty() {
            let v = num.parse::<f64>().map_err(|_| {
                ExportError::parse(VectorFormat::Svg, format!("bad number {num:?} in path data"))
            })?;
            out.push(Token::Num(v));
            num.clear();
        }
        Ok(())
    };
    for c in d.chars() {
        match c {
            '0'..='9' | '.' => num.push(c),
            '-' | '+' => {
                // a sign starts a new number unless it follows an exponent
                if !num.ends_with(|c: char| c == 'e' || c == 'E') {
                    flush(&mut num, &mut out)?;
                }
                num.push(c);
            }
            'e' | 'E' if !num.is_empty() => num.push(c),
            c if c.is_whitespace() || c == ',' => flush(&mut num, &mut out)?,
            'M' | 'L' | 'Z' | 'z' => {
                flush(&mut num, &mut out)?;
                out.push(Token::Cmd(c.to_ascii_uppercase()));
            }
            other => {
                return Err(ExportError::parse(
                    VectorFormat::Svg,
                    format!("unsupported path command {other:?}"),
                ))
            }
        }
    }
    flush(&mut num, &mut out)?;
    Ok(out)
}

/// Rings of one `d` attribute. Only absolute `M`, `L` and `Z` are accepted;
/// coordinates after `M` without a command are implicit line-tos.
fn parse_path_data(d: &str) -> Result<Vec<Vec<Point2<f64>>>, ExportError> {
    let tokens = tokenize(d)?;
    let mut rings = Vec::new();
    let mut ring: Vec<Point2<f64>> = Vec::new();
    let mut pending: Option<f64> = None;
    let mut started = false;

    for t in tokens {
        match t {
            Token::Cmd('M') => {
                if !ring.is_empty() {
                    return Err(ExportError::parse(VectorFormat::Svg, "subpath is not closed"));
                }
                started = true;
            }
            Token::Cmd('L') if started => {}
            Token::Cmd('Z') => {
                if pending.is_some() {
                    return Err(ExportError::parse(VectorFormat::Svg, "dangling coordinate"));
                }
                // a closing vertex repeating the first one is redundant
                if ring.len() > 1 && ring.first() == ring.last() {
                    ring.pop();
                }
                rings.push(std::mem::take(&mut ring));
                started = false;
            }
            Token::Num(v) if started => match pending.take() {
                None => pending = Some(v),
                Some(x) => ring.push(Point2::new(x, v)),
            },
            _ => {
                return Err(ExportError::parse(
                    VectorFormat::Svg,
                    "path data must start with M",
                ))
            }
        }
    }
    if !ring.is_empty() || pending.is_some() {
        return Err(ExportError::parse(VectorFormat::Svg, "subpath is not closed"));
    }
    Ok(rings)
}

/// Parse an SVG document back into geometry. Every `<path>` contributes its
/// rings; rings are regrouped into paths by orientation.
pub fn read_svg(doc: &str) -> Result<VectorGeometry, ExportError> {
    let mut reader = Reader::from_str(doc);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut rings = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) if e.local_name().as_ref() == b"path" => {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"d" {
                        let d = std::str::from_utf8(&attr.value).map_err(xml_err)?;
                        rings.extend(parse_path_data(d)?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    group_rings(VectorFormat::Svg, rings)
}
