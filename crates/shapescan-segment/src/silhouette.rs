//! Object silhouette: outer ring plus holes on pixel edges.

use nalgebra::Point2;
use serde::Serialize;
use shapescan_core::{
    has_crossings, label_components, signed_area, trace_boundaries, Bounds, ComponentStats,
    Components, Connectivity, Mask,
};

/// Closed rings of one object in rectified canvas pixels.
///
/// The outer ring runs clockwise on the page (positive area), holes
/// counter-clockwise. Rings are simple and mutually non-crossing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Silhouette {
    outer: Vec<Point2<f64>>,
    holes: Vec<Vec<Point2<f64>>>,
    area_px: f64,
    filled_holes: usize,
}

impl Silhouette {
    /// Build from explicit rings; `None` unless the outer ring has positive
    /// area, every hole negative area, and no two edges cross.
    pub fn from_rings(outer: Vec<Point2<f64>>, holes: Vec<Vec<Point2<f64>>>) -> Option<Self> {
        let outer_area = signed_area(&outer);
        if outer.len() < 3 || !(outer_area > 0.0) {
            return None;
        }
        if holes.iter().any(|h| h.len() < 3 || !(signed_area(h) < 0.0)) {
            return None;
        }
        let mut refs: Vec<&[Point2<f64>]> = vec![outer.as_slice()];
        refs.extend(holes.iter().map(|h| h.as_slice()));
        if has_crossings(&refs) {
            return None;
        }
        let area_px = outer_area + holes.iter().map(|h| signed_area(h)).sum::<f64>();
        Some(Self {
            outer,
            holes,
            area_px,
            filled_holes: 0,
        })
    }

    pub fn outer(&self) -> &[Point2<f64>] {
        &self.outer
    }

    pub fn holes(&self) -> &[Vec<Point2<f64>>] {
        &self.holes
    }

    /// Every ring, outer first.
    pub fn rings(&self) -> impl Iterator<Item = &[Point2<f64>]> {
        std::iter::once(self.outer.as_slice()).chain(self.holes.iter().map(|h| h.as_slice()))
    }

    pub fn ring_count(&self) -> usize {
        1 + self.holes.len()
    }

    /// Enclosed area (outer minus holes) in square pixels.
    pub fn area_px(&self) -> f64 {
        self.area_px
    }

    /// Area inside the outer ring, holes included.
    pub fn outer_area_px(&self) -> f64 {
        signed_area(&self.outer)
    }

    pub fn filled_holes(&self) -> usize {
        self.filled_holes
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.outer.iter())
    }
}

/// Fill background pockets of `mask` smaller than `min_hole_px`. Returns the
/// number of filled holes.
fn fill_small_holes(mask: &mut Mask, min_hole_px: f64) -> usize {
    // holes of a 4-connected region are 8-connected
    let inv = mask.invert();
    let comps = label_components(&inv, Connectivity::Eight);
    let mut filled = 0;
    for s in &comps.stats {
        if s.touches_border(mask.width, mask.height) || s.area as f64 >= min_hole_px {
            continue;
        }
        for y in s.min_y..=s.max_y {
            for x in s.min_x..=s.max_x {
                if comps.labels[y * mask.width + x] == s.label {
                    mask.set(x, y, true);
                }
            }
        }
        filled += 1;
    }
    filled
}

/// Trace one labeled region into a silhouette.
pub fn silhouette_from_region(
    comps: &Components,
    stats: &ComponentStats,
    min_hole_px: f64,
) -> Option<Silhouette> {
    let (crop, (ox, oy)) = comps.extract(stats);
    // one pixel of padding so holes never touch the crop border
    let mut padded = Mask::from_fn(crop.width + 2, crop.height + 2, |x, y| {
        x >= 1 && y >= 1 && x <= crop.width && y <= crop.height && crop.get(x - 1, y - 1)
    });
    let filled = fill_small_holes(&mut padded, min_hole_px);

    let shift = |ring: Vec<Point2<f64>>| -> Vec<Point2<f64>> {
        ring.into_iter()
            .map(|p| Point2::new(p.x + ox as f64 - 1.0, p.y + oy as f64 - 1.0))
            .collect()
    };

    let mut outer: Option<Vec<Point2<f64>>> = None;
    let mut holes = Vec::new();
    for ring in trace_boundaries(&padded) {
        let a = signed_area(&ring);
        if a > 0.0 {
            match &outer {
                Some(o) if signed_area(o) >= a => {}
                _ => outer = Some(ring),
            }
        } else if a < 0.0 {
            holes.push(shift(ring));
        }
    }
    let mut s = Silhouette::from_rings(shift(outer?), holes)?;
    s.filled_holes = filled;
    Some(s)
}
