//! Quadrilateral candidates from dark connected components.

use nalgebra::{Point2, Vector2};
use shapescan_core::{
    is_convex, label_components, perimeter, signed_area, simplify_closed, trace_boundaries,
    Connectivity, Mask,
};

use crate::params::FiducialParams;

/// Four image-space corners, clockwise on the page, in pixel-corner
/// coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
    pub corners: [Point2<f64>; 4],
}

impl Quad {
    pub fn side_lengths(&self) -> [f64; 4] {
        let c = &self.corners;
        [0, 1, 2, 3].map(|i| (c[(i + 1) % 4] - c[i]).norm())
    }

    pub fn min_side(&self) -> f64 {
        self.side_lengths().into_iter().fold(f64::INFINITY, f64::min)
    }

    /// `(min side / max side) × min |sin(corner angle)|`, 1 for a square.
    pub fn regularity(&self) -> f64 {
        let sides = self.side_lengths();
        let max = sides.iter().copied().fold(0.0, f64::max);
        let min = sides.iter().copied().fold(f64::INFINITY, f64::min);
        if max <= 0.0 {
            return 0.0;
        }
        let c = &self.corners;
        let min_sin = (0..4)
            .map(|i| {
                let a = c[(i + 3) % 4] - c[i];
                let b = c[(i + 1) % 4] - c[i];
                (a.perp(&b) / (a.norm() * b.norm())).abs()
            })
            .fold(1.0, f64::min);
        (min / max) * min_sin
    }
}

/// Extract convex quads from every dark mask.
pub(crate) fn find_quads(masks: &[Mask], params: &FiducialParams) -> Vec<Quad> {
    let mut out = Vec::new();
    for mask in masks {
        let before = out.len();
        quads_in_mask(mask, params, &mut out);
        log::debug!("dark mask: {} quad candidates", out.len() - before);
    }
    out
}

fn quads_in_mask(mask: &Mask, params: &FiducialParams, out: &mut Vec<Quad>) {
    let comps = label_components(mask, Connectivity::Eight);
    let max_area = (params.max_area_frac * (mask.width * mask.height) as f64) as usize;
    let min_side = params.min_side_px.max(4.0);

    for stats in &comps.stats {
        if stats.touches_border(mask.width, mask.height)
            || (stats.bbox_width() as f64) < min_side
            || (stats.bbox_height() as f64) < min_side
            || stats.area > max_area
        {
            continue;
        }
        let (crop, (ox, oy)) = comps.extract(stats);
        let Some(outer) = trace_boundaries(&crop)
            .into_iter()
            .max_by(|a, b| signed_area(a).total_cmp(&signed_area(b)))
        else {
            continue;
        };
        let outer: Vec<Point2<f64>> = outer
            .into_iter()
            .map(|p| Point2::new(p.x + ox as f64, p.y + oy as f64))
            .collect();

        let eps = params.approx_epsilon_frac * perimeter(&outer);
        let approx = simplify_closed(&outer, eps);
        if approx.len() != 4 || !is_convex(&approx) || signed_area(&approx) <= 0.0 {
            continue;
        }
        let rough = [approx[0], approx[1], approx[2], approx[3]];
        let quad = Quad {
            corners: refine_corners(&outer, &rough).unwrap_or(rough),
        };
        if quad.min_side() < min_side {
            continue;
        }
        out.push(quad);
    }
}

/// Total least-squares line `(point, unit direction)`.
fn fit_line(pts: &[Point2<f64>]) -> Option<(Point2<f64>, Vector2<f64>)> {
    if pts.len() < 2 {
        return None;
    }
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in pts {
        let (dx, dy) = (p.x - cx, p.y - cy);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    Some((Point2::new(cx, cy), Vector2::new(theta.cos(), theta.sin())))
}

fn intersect(a: (Point2<f64>, Vector2<f64>), b: (Point2<f64>, Vector2<f64>)) -> Option<Point2<f64>> {
    let denom = a.1.perp(&b.1);
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = (b.0 - a.0).perp(&b.1) / denom;
    Some(a.0 + a.1 * t)
}

/// Re-estimate the corners as intersections of lines fitted to the boundary
/// points of each side (ignoring the parts near the rough corners).
fn refine_corners(ring: &[Point2<f64>], rough: &[Point2<f64>; 4]) -> Option<[Point2<f64>; 4]> {
    let mut lines = Vec::with_capacity(4);
    for i in 0..4 {
        let (a, b) = (rough[i], rough[(i + 1) % 4]);
        let ab = b - a;
        let len = ab.norm();
        if len <= 0.0 {
            return None;
        }
        let dir = ab / len;
        let band = (0.05 * len).max(1.5);
        let side_pts: Vec<Point2<f64>> = ring
            .iter()
            .copied()
            .filter(|p| {
                let t = (p - a).dot(&dir);
                t > 0.15 * len && t < 0.85 * len && (p - a).perp(&dir).abs() < band
            })
            .collect();
        let line = fit_line(&side_pts).unwrap_or((a, dir));
        lines.push(line);
    }
    let mut out = *rough;
    for i in 0..4 {
        let p = intersect(lines[(i + 3) % 4], lines[i])?;
        let limit = 0.1 * (rough[(i + 1) % 4] - rough[i]).norm();
        if (p - rough[i]).norm() > limit {
            return None;
        }
        out[i] = p;
    }
    Some(out)
}
