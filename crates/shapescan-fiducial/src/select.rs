//! Corner assignment: which decoded marker sits at which sheet corner.
//!
//! Every 4-subset of candidates is tried against all 24 orderings of the
//! sheet corners. An ordering is admissible when ids match the printed
//! layout, the quadrilateral keeps the sheet's orientation, the 4-point
//! homography exists and every marker's decoded rotation agrees with the
//! sheet's x axis. Orderings are ranked by homography conditioning, subsets
//! by enclosed area and then total confidence.

use std::collections::BTreeSet;

use nalgebra::{Point2, Vector2};
use serde::Serialize;
use shapescan_core::{
    collinearity_ratio, is_convex, min_pairwise_distance, signed_area, solve_4pt,
    HomographyError, SheetCorner, SheetLayout,
};

use crate::decode::MarkerCandidate;
use crate::error::FiducialError;
use crate::params::FiducialParams;

/// One marker of a [`MarkerSet`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectedMarker {
    pub id: u32,
    pub center: Point2<f64>,
    pub corners: [Point2<f64>; 4],
    pub confidence: f64,
    pub rotation: u8,
    pub hamming: u8,
}

impl From<&MarkerCandidate> for DetectedMarker {
    fn from(c: &MarkerCandidate) -> Self {
        Self {
            id: c.id,
            center: c.center,
            corners: c.corners,
            confidence: c.confidence,
            rotation: c.rotation,
            hamming: c.hamming,
        }
    }
}

/// Exactly four markers in [`SheetCorner::ALL`] order (TL, TR, BR, BL),
/// pairwise separated and with no three centers collinear.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerSet {
    markers: [DetectedMarker; 4],
}

impl MarkerSet {
    /// `markers[i]` sits at `SheetCorner::ALL[i]`. Confidences are clamped
    /// to `[0, 1]`.
    pub fn new(
        mut markers: [DetectedMarker; 4],
        min_separation_px: f64,
        collinearity_tol: f64,
    ) -> Result<Self, HomographyError> {
        for m in &mut markers {
            m.confidence = if m.confidence.is_finite() {
                m.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        let pts = markers.each_ref().map(|m| m.center);
        let (a, b, distance) = min_pairwise_distance(&pts);
        if !(distance >= min_separation_px) || distance <= 0.0 {
            return Err(HomographyError::CoincidentPoints { a, b, distance });
        }
        let ratio = collinearity_ratio(&pts);
        if !(ratio >= collinearity_tol) {
            return Err(HomographyError::Collinear { ratio });
        }
        Ok(Self { markers })
    }

    pub fn markers(&self) -> &[DetectedMarker; 4] {
        &self.markers
    }

    pub fn get(&self, corner: SheetCorner) -> &DetectedMarker {
        &self.markers[corner.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SheetCorner, &DetectedMarker)> {
        SheetCorner::ALL.into_iter().zip(self.markers.iter())
    }

    /// Marker centers in TL, TR, BR, BL order.
    pub fn points(&self) -> [Point2<f64>; 4] {
        self.markers.each_ref().map(|m| m.center)
    }

    pub fn confidences(&self) -> [f64; 4] {
        self.markers.each_ref().map(|m| m.confidence)
    }
}

fn permutations4() -> Vec<[usize; 4]> {
    let mut out = Vec::with_capacity(24);
    for a in 0..4 {
        for b in 0..4 {
            for c in 0..4 {
                for d in 0..4 {
                    let p = [a, b, c, d];
                    if (0..4).all(|i| p.contains(&i)) {
                        out.push(p);
                    }
                }
            }
        }
    }
    out
}

struct Ranked {
    members: [usize; 4], // candidate index per corner
    condition: f64,
    area: f64,
    confidence: f64,
}

/// Distinct layout ids among the candidates.
pub(crate) fn distinct_ids(cands: &[MarkerCandidate], layout: &SheetLayout) -> usize {
    cands
        .iter()
        .filter(|c| layout.corner_for_id(c.id).is_some())
        .map(|c| c.id)
        .collect::<BTreeSet<_>>()
        .len()
}

/// Keep the `cap` most confident candidates per id, preserving the
/// confidence order of the input.
fn cap_per_id(cands: &[MarkerCandidate], layout: &SheetLayout, cap: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..cands.len())
        .filter(|&i| layout.corner_for_id(cands[i].id).is_some())
        .collect();
    order.sort_by(|&a, &b| cands[b].confidence.total_cmp(&cands[a].confidence).then(a.cmp(&b)));
    let mut per_id = std::collections::BTreeMap::<u32, usize>::new();
    order
        .into_iter()
        .filter(|&i| {
            let n = per_id.entry(cands[i].id).or_insert(0);
            *n += 1;
            *n <= cap
        })
        .collect()
}

pub(crate) fn select_markers(
    cands: &[MarkerCandidate],
    layout: &SheetLayout,
    params: &FiducialParams,
) -> Result<MarkerSet, FiducialError> {
    let found = distinct_ids(cands, layout);
    if found < 4 {
        return Err(FiducialError::MarkerDetectionFailed { found });
    }

    let pool = cap_per_id(cands, layout, params.max_candidates_per_id);
    let sheet_pts = layout.marker_centers();
    let perms = permutations4();
    let min_dot = params.max_rotation_error_deg.to_radians().cos();

    let mut best: Option<Ranked> = None;
    let mut degenerate: Option<HomographyError> = None;
    let n = pool.len();

    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                for l in k + 1..n {
                    let subset = [pool[i], pool[j], pool[k], pool[l]];
                    let ids: BTreeSet<u32> = subset.iter().map(|&s| cands[s].id).collect();
                    if ids.len() < 4 {
                        continue;
                    }

                    let mut subset_best: Option<Ranked> = None;
                    for p in &perms {
                        let members = p.map(|q| subset[q]);
                        match evaluate(cands, &members, layout, &sheet_pts, params, min_dot) {
                            Ok(Some(r)) => {
                                if subset_best.as_ref().map_or(true, |b| r.condition < b.condition) {
                                    subset_best = Some(r);
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                degenerate.get_or_insert(e);
                            }
                        }
                    }

                    if let Some(r) = subset_best {
                        let better = match &best {
                            None => true,
                            Some(b) => {
                                r.area > b.area || (r.area == b.area && r.confidence > b.confidence)
                            }
                        };
                        if better {
                            best = Some(r);
                        }
                    }
                }
            }
        }
    }

    let Some(best) = best else {
        if let Some(e) = degenerate {
            log::debug!("only degenerate marker configurations: {e}");
            return Err(FiducialError::Degenerate(e));
        }
        log::debug!("{found} marker ids found but no admissible corner assignment");
        return Err(FiducialError::MarkerDetectionFailed { found });
    };

    log::debug!(
        "marker assignment: area {:.0}px², condition {:.2}, confidence {:.3}",
        best.area,
        best.condition,
        best.confidence
    );
    let markers = best.members.map(|m| DetectedMarker::from(&cands[m]));
    MarkerSet::new(markers, params.min_separation_px, params.collinearity_tol)
        .map_err(FiducialError::Degenerate)
}

/// `Ok(None)`: not admissible. `Err`: ids fit but the geometry is degenerate.
fn evaluate(
    cands: &[MarkerCandidate],
    members: &[usize; 4],
    layout: &SheetLayout,
    sheet_pts: &[Point2<f64>; 4],
    params: &FiducialParams,
    min_dot: f64,
) -> Result<Option<Ranked>, HomographyError> {
    // (a) ids agree with the printed corners
    for (corner, &m) in SheetCorner::ALL.iter().zip(members) {
        if cands[m].id != layout.marker_id(*corner) {
            return Ok(None);
        }
    }
    let img_pts = members.map(|m| cands[m].center);

    let (a, b, distance) = min_pairwise_distance(&img_pts);
    if !(distance >= params.min_separation_px) {
        return Err(HomographyError::CoincidentPoints { a, b, distance });
    }
    let ratio = collinearity_ratio(&img_pts);
    if !(ratio >= params.collinearity_tol) {
        return Err(HomographyError::Collinear { ratio });
    }

    // (b) convex and not mirrored: TL, TR, BR, BL runs clockwise on the page
    let area = signed_area(&img_pts);
    if area <= 0.0 || !is_convex(&img_pts) {
        return Ok(None);
    }

    // (c) the projective map exists
    let Some(sol) = solve_4pt(sheet_pts, &img_pts) else {
        return Ok(None);
    };

    // (d) decoded rotations agree with the mapped sheet x axis
    for (k, &m) in members.iter().enumerate() {
        let c = sheet_pts[k];
        let d = sol.homography.apply(c + Vector2::new(1.0, 0.0)) - sol.homography.apply(c);
        let norm = d.norm();
        if !(norm > 0.0) || d.dot(&cands[m].x_axis) / norm < min_dot {
            return Ok(None);
        }
    }

    Ok(Some(Ranked {
        members: *members,
        condition: sol.condition,
        area,
        confidence: members.iter().map(|&m| cands[m].confidence).sum(),
    }))
}
