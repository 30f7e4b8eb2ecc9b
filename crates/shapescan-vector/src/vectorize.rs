//! Silhouette rings in canvas pixels to simplified millimeter paths.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use shapescan_core::{has_crossings, point_in_ring, signed_area, simplify_closed, ScaleFactor};
use shapescan_segment::Silhouette;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::VectorizeError;
use crate::geometry::{VectorGeometry, VectorPath};

/// Where the millimeter origin of the output sits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Translate so the geometry's minimum corner is `(0, 0)`.
    #[default]
    BoundingBox,
    /// Keep sheet coordinates (origin at the sheet's top-left corner).
    Sheet,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeParams {
    /// Maximum perpendicular deviation of the simplified outline, in mm.
    pub tolerance_mm: f64,
    /// How often the tolerance may be halved before a ring is kept as traced.
    pub max_halvings: u32,
    pub anchor: Anchor,
}

impl Default for VectorizeParams {
    fn default() -> Self {
        Self {
            tolerance_mm: 0.25,
            max_halvings: 6,
            anchor: Anchor::BoundingBox,
        }
    }
}

impl VectorizeParams {
    pub fn validate(&self) -> Result<(), VectorizeError> {
        if !self.tolerance_mm.is_finite() || self.tolerance_mm < 0.0 {
            return Err(VectorizeError::InvalidParams(format!(
                "tolerance_mm must be finite and non-negative, got {}",
                self.tolerance_mm
            )));
        }
        if self.max_halvings > 32 {
            return Err(VectorizeError::InvalidParams(
                "max_halvings must be at most 32".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Vectorizer {
    params: VectorizeParams,
}

/// A simplified ring keeps the traced ring's role when it has 3 or more
/// vertices, is simple, keeps the sign of its area, crosses no other ring
/// and keeps holes inside the outer ring.
fn acceptable(
    candidate: &[Point2<f64>],
    index: usize,
    positive: bool,
    rings: &[Vec<Point2<f64>>],
) -> bool {
    if candidate.len() < 3 {
        return false;
    }
    let area = signed_area(candidate);
    if (area > 0.0) != positive || area == 0.0 {
        return false;
    }
    let mut refs: Vec<&[Point2<f64>]> = Vec::with_capacity(rings.len());
    refs.push(candidate);
    refs.extend(
        rings
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != index)
            .map(|(_, r)| r.as_slice()),
    );
    if has_crossings(&refs) {
        return false;
    }
    if index == 0 {
        rings[1..].iter().all(|h| point_in_ring(h[0], candidate))
    } else {
        point_in_ring(candidate[0], &rings[0])
    }
}

impl Vectorizer {
    pub fn new(params: VectorizeParams) -> Result<Self, VectorizeError> {
        params.validate()?;
        Ok(Self { params })
    }

    #[inline]
    pub fn params(&self) -> &VectorizeParams {
        &self.params
    }

    /// Convert a pixel-space silhouette into millimeter geometry.
    ///
    /// Ring count, nesting and orientation of the silhouette are preserved.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, silhouette), fields(rings = silhouette.ring_count()))
    )]
    pub fn vectorize(
        &self,
        silhouette: &Silhouette,
        scale: ScaleFactor,
    ) -> Result<VectorGeometry, VectorizeError> {
        let mut rings: Vec<Vec<Point2<f64>>> = silhouette
            .rings()
            .map(|r| r.iter().map(|p| scale.px_to_mm(*p)).collect())
            .collect();

        let traced_vertices: usize = rings.iter().map(Vec::len).sum();
        for i in 0..rings.len() {
            let positive = i == 0;
            let mut tol = self.params.tolerance_mm;
            let mut accepted = None;
            for attempt in 0..=self.params.max_halvings {
                let candidate = simplify_closed(&rings[i], tol);
                if acceptable(&candidate, i, positive, &rings) {
                    accepted = Some(candidate);
                    break;
                }
                log::warn!(
                    "ring {i}: simplification at {tol:.4} mm changed topology (attempt {})",
                    attempt + 1
                );
                tol *= 0.5;
            }
            match accepted {
                Some(r) => rings[i] = r,
                None => log::warn!("ring {i}: keeping the traced outline unsimplified"),
            }
        }

        let mut it = rings.into_iter();
        let outer = it.next().ok_or(VectorizeError::Empty)?;
        let path = VectorPath::new(outer, it.collect())?;
        let mut geometry = VectorGeometry::new(vec![path])?;
        if self.params.anchor == Anchor::BoundingBox {
            let b = geometry.bounds();
            geometry = geometry.translated(Vector2::new(-b.min_x, -b.min_y));
        }

        log::debug!(
            "vectorized {} ring(s): {traced_vertices} traced vertices -> {}, {:.2} x {:.2} mm",
            geometry.ring_count(),
            geometry.rings().map(<[Point2<f64>]>::len).sum::<usize>(),
            geometry.width(),
            geometry.height()
        );
        Ok(geometry)
    }
}
