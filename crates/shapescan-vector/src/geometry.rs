//! Millimeter vector geometry.
//!
//! Coordinates are sheet-aligned millimeters with y down the page. Outer
//! rings run clockwise as seen on the page (positive shoelace area), holes
//! counter-clockwise. Values are immutable once built.

use nalgebra::{Point2, Vector2};
use serde::Serialize;
use shapescan_core::{signed_area, Bounds};

use crate::error::VectorizeError;

/// One object outline: an outer ring and its holes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VectorPath {
    rings: Vec<Vec<Point2<f64>>>,
}

fn oriented(mut ring: Vec<Point2<f64>>, positive: bool) -> Vec<Point2<f64>> {
    if (signed_area(&ring) > 0.0) != positive {
        ring.reverse();
    }
    ring
}

impl VectorPath {
    /// Orientation is normalized; rings need 3 finite vertices and non-zero
    /// area.
    pub fn new(
        outer: Vec<Point2<f64>>,
        holes: Vec<Vec<Point2<f64>>>,
    ) -> Result<Self, VectorizeError> {
        let mut rings = Vec::with_capacity(1 + holes.len());
        rings.push(outer);
        rings.extend(holes);
        for (i, r) in rings.iter().enumerate() {
            if r.len() < 3 {
                return Err(VectorizeError::InvalidRing {
                    ring: i,
                    reason: "fewer than 3 vertices",
                });
            }
            if r.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
                return Err(VectorizeError::InvalidRing {
                    ring: i,
                    reason: "non-finite coordinate",
                });
            }
            if signed_area(r) == 0.0 {
                return Err(VectorizeError::InvalidRing {
                    ring: i,
                    reason: "zero area",
                });
            }
        }
        let rings = rings
            .into_iter()
            .enumerate()
            .map(|(i, r)| oriented(r, i == 0))
            .collect();
        Ok(Self { rings })
    }

    pub fn outer(&self) -> &[Point2<f64>] {
        &self.rings[0]
    }

    pub fn holes(&self) -> &[Vec<Point2<f64>>] {
        &self.rings[1..]
    }

    /// Outer ring first, then holes.
    pub fn rings(&self) -> &[Vec<Point2<f64>>] {
        &self.rings
    }

    /// Enclosed area in mm², holes subtracted.
    pub fn area(&self) -> f64 {
        self.rings.iter().map(|r| signed_area(r)).sum()
    }

    fn translated(&self, d: Vector2<f64>) -> Self {
        Self {
            rings: self
                .rings
                .iter()
                .map(|r| r.iter().map(|p| p + d).collect())
                .collect(),
        }
    }
}

/// The vectorized result: one or more paths in millimeters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VectorGeometry {
    paths: Vec<VectorPath>,
    bounds: Bounds,
}

impl VectorGeometry {
    pub fn new(paths: Vec<VectorPath>) -> Result<Self, VectorizeError> {
        let bounds = paths
            .iter()
            .filter_map(|p| Bounds::from_points(p.outer().iter()))
            .reduce(|a, b| a.union(&b))
            .ok_or(VectorizeError::Empty)?;
        Ok(Self { paths, bounds })
    }

    pub fn paths(&self) -> &[VectorPath] {
        &self.paths
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn width(&self) -> f64 {
        self.bounds.width()
    }

    pub fn height(&self) -> f64 {
        self.bounds.height()
    }

    pub fn ring_count(&self) -> usize {
        self.paths.iter().map(|p| p.rings.len()).sum()
    }

    pub fn area(&self) -> f64 {
        self.paths.iter().map(VectorPath::area).sum()
    }

    /// Every ring of every path, path order then ring order.
    pub fn rings(&self) -> impl Iterator<Item = &[Point2<f64>]> {
        self.paths
            .iter()
            .flat_map(|p| p.rings.iter().map(|r| r.as_slice()))
    }

    /// A copy moved by `d`.
    pub fn translated(&self, d: Vector2<f64>) -> Self {
        Self {
            paths: self.paths.iter().map(|p| p.translated(d)).collect(),
            bounds: Bounds {
                min_x: self.bounds.min_x + d.x,
                min_y: self.bounds.min_y + d.y,
                max_x: self.bounds.max_x + d.x,
                max_y: self.bounds.max_y + d.y,
            },
        }
    }

    /// Same structure and every vertex within `tol` (Chebyshev distance).
    pub fn approx_eq(&self, other: &VectorGeometry, tol: f64) -> bool {
        self.paths.len() == other.paths.len()
            && self.paths.iter().zip(&other.paths).all(|(a, b)| {
                a.rings.len() == b.rings.len()
                    && a.rings.iter().zip(&b.rings).all(|(ra, rb)| {
                        ra.len() == rb.len()
                            && ra.iter().zip(rb).all(|(p, q)| {
                                (p.x - q.x).abs() <= tol && (p.y - q.y).abs() <= tol
                            })
                    })
            })
    }
}
