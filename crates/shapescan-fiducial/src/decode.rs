//! Marker decoding on image-space quads.
//!
//! A quad is mapped onto the 6×6 cell square of a marker through its own
//! homography; every cell is read as the 3×3 mean around the projected cell
//! center and binarized with an Otsu threshold computed over a denser grid.

use nalgebra::{Point2, Vector2};
use serde::Serialize;
use shapescan_core::{homography_from_4pt, GrayImageView, Homography, MARKER_CELLS};

use crate::candidates::Quad;
use crate::params::FiducialParams;
use crate::threshold::otsu_threshold;
use crate::Matcher;

/// A decoded, scored marker observation in image pixels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerCandidate {
    pub id: u32,
    /// Quarter turns (clockwise on the page) of the printed code as observed.
    pub rotation: u8,
    pub hamming: u8,
    /// Observed data bits (row-major, black = 1).
    pub code: u64,
    /// Outer marker corners, clockwise on the page.
    pub corners: [Point2<f64>; 4],
    /// Perspective-correct image of the marker center.
    pub center: Point2<f64>,
    /// Unit image direction of the printed marker's +x axis.
    pub x_axis: Vector2<f64>,
    pub min_side_px: f64,
    pub border_score: f64,
    pub contrast: f64,
    pub regularity: f64,
    pub confidence: f64,
}

struct SampleGrid {
    points: Vec<Point2<f64>>, // row-major: cy * cells + cx
    threshold_points: Vec<Point2<f64>>,
}

impl SampleGrid {
    fn new(inset_frac: f64) -> Self {
        const THRESH_SUBDIV: usize = 3;
        let cells = MARKER_CELLS;
        let full = cells as f64;
        let inset = inset_frac.clamp(0.0, 0.2) * full;
        let side = full - 2.0 * inset;

        let step = side / cells as f64;
        let points = (0..cells * cells)
            .map(|i| {
                let (cx, cy) = (i % cells, i / cells);
                Point2::new(
                    inset + (cx as f64 + 0.5) * step,
                    inset + (cy as f64 + 0.5) * step,
                )
            })
            .collect();

        let grid = cells * THRESH_SUBDIV;
        let tstep = side / grid as f64;
        let threshold_points = (0..grid * grid)
            .map(|i| {
                let (tx, ty) = (i % grid, i / grid);
                Point2::new(
                    inset + (tx as f64 + 0.5) * tstep,
                    inset + (ty as f64 + 0.5) * tstep,
                )
            })
            .collect();

        Self {
            points,
            threshold_points,
        }
    }
}

/// Reusable decoder; keeps its scratch buffers between quads.
pub(crate) struct MarkerDecoder<'a> {
    params: &'a FiducialParams,
    matcher: &'a Matcher,
    grid: SampleGrid,
    scratch_cells: Vec<u8>,
    scratch_thr: Vec<u8>,
}

impl<'a> MarkerDecoder<'a> {
    pub(crate) fn new(params: &'a FiducialParams, matcher: &'a Matcher) -> Self {
        let grid = SampleGrid::new(params.inset_frac);
        Self {
            params,
            matcher,
            scratch_cells: Vec::with_capacity(grid.points.len()),
            scratch_thr: Vec::with_capacity(grid.threshold_points.len()),
            grid,
        }
    }

    pub(crate) fn decode(
        &mut self,
        img: &GrayImageView<'_>,
        quad: &Quad,
    ) -> Option<MarkerCandidate> {
        let s = MARKER_CELLS as f64;
        let cell_square = [
            Point2::new(0.0, 0.0),
            Point2::new(s, 0.0),
            Point2::new(s, s),
            Point2::new(0.0, s),
        ];
        let h = homography_from_4pt(&cell_square, &quad.corners)?;

        self.scratch_cells.clear();
        for p in &self.grid.points {
            let q = h.apply(*p);
            self.scratch_cells.push(sample_mean_3x3(img, q.x, q.y)?);
        }
        self.scratch_thr.clear();
        for p in &self.grid.threshold_points {
            let q = h.apply(*p);
            if let Some(v) = sample_mean_3x3(img, q.x, q.y) {
                self.scratch_thr.push(v);
            }
        }
        let thr = if self.scratch_thr.is_empty() {
            otsu_threshold(&self.scratch_cells)
        } else {
            otsu_threshold(&self.scratch_thr)
        };

        let obs = read_cells(&self.scratch_cells, thr)?;
        if obs.border_score < self.params.min_border_score {
            return None;
        }
        let m = self.matcher.match_code(obs.code)?;

        let bits = self.matcher.dictionary().bit_count().max(1) as f64;
        let regularity = quad.regularity();
        let ham_pen = 1.0 - m.hamming as f64 / bits;
        let confidence = (obs.border_score * ham_pen * regularity * obs.contrast).clamp(0.0, 1.0);

        let c = Point2::new(0.5 * s, 0.5 * s);
        let center = h.apply(c);
        let x_axis = marker_x_axis(&h, c, m.rotation)?;

        Some(MarkerCandidate {
            id: m.id,
            rotation: m.rotation,
            hamming: m.hamming,
            code: obs.code,
            corners: quad.corners,
            center,
            x_axis,
            min_side_px: quad.min_side(),
            border_score: obs.border_score,
            contrast: obs.contrast,
            regularity,
            confidence,
        })
    }
}

#[derive(Clone, Copy, Debug)]
struct CellObservation {
    code: u64,
    border_score: f64,
    contrast: f64,
}

fn read_cells(samples: &[u8], thr: u8) -> Option<CellObservation> {
    let cells = MARKER_CELLS;
    if samples.len() != cells * cells {
        return None;
    }
    let bits = cells - 2;
    let mut code = 0u64;
    let mut border_ok = 0u32;
    let mut border_total = 0u32;
    let (mut dark_sum, mut dark_n, mut light_sum, mut light_n) = (0u32, 0u32, 0u32, 0u32);

    for cy in 0..cells {
        for cx in 0..cells {
            let v = samples[cy * cells + cx];
            let is_black = v < thr;
            if is_black {
                dark_sum += v as u32;
                dark_n += 1;
            } else {
                light_sum += v as u32;
                light_n += 1;
            }
            let is_border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
            if is_border {
                border_total += 1;
                border_ok += is_black as u32;
            } else if is_black {
                code |= 1u64 << ((cy - 1) * bits + (cx - 1));
            }
        }
    }

    let contrast = if dark_n == 0 || light_n == 0 {
        0.0
    } else {
        let dark = dark_sum as f64 / dark_n as f64;
        let light = light_sum as f64 / light_n as f64;
        ((light - dark) / 128.0).clamp(0.0, 1.0)
    };

    Some(CellObservation {
        code,
        border_score: border_ok as f64 / border_total.max(1) as f64,
        contrast,
    })
}

/// Image direction of the printed +x axis. The observed grid is the printed
/// code turned `rotation` quarter turns clockwise, so printed +x runs along
/// +u, +v, -u, -v of the sampling frame for rotations 0..=3.
fn marker_x_axis(h: &Homography, c: Point2<f64>, rotation: u8) -> Option<Vector2<f64>> {
    let a = match rotation & 3 {
        0 => Vector2::new(1.0, 0.0),
        1 => Vector2::new(0.0, 1.0),
        2 => Vector2::new(-1.0, 0.0),
        _ => Vector2::new(0.0, -1.0),
    };
    let d = h.apply(c + a) - h.apply(c);
    let n = d.norm();
    (n > 0.0 && n.is_finite()).then(|| d / n)
}

fn sample_mean_3x3(img: &GrayImageView<'_>, x: f64, y: f64) -> Option<u8> {
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    let ix = x.floor() as i64;
    let iy = y.floor() as i64;
    if ix < 1 || iy < 1 || ix + 1 >= img.width as i64 || iy + 1 >= img.height as i64 {
        return None;
    }
    let (ix, iy) = (ix as usize, iy as usize);
    let mut sum = 0u32;
    for yy in iy - 1..=iy + 1 {
        for xx in ix - 1..=ix + 1 {
            sum += img.data[yy * img.width + xx] as u32;
        }
    }
    Some((sum / 9) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::marker_cells;
    use crate::SHEET_4X4_V1;
    use approx::assert_relative_eq;
    use shapescan_core::GrayImage;

    /// Marker with `cell_px` pixel cells and a white margin, rotated by
    /// `quarter_turns` clockwise.
    fn marker_image(id: u32, cell_px: usize, margin: usize, quarter_turns: u8) -> GrayImage {
        let cells = marker_cells(&SHEET_4X4_V1, id).unwrap();
        let side = MARKER_CELLS * cell_px + 2 * margin;
        let mut data = vec![230u8; side * side];
        let n = MARKER_CELLS;
        for cy in 0..n {
            for cx in 0..n {
                // destination cell of printed cell (cx, cy) after clockwise turns
                let (mut dx, mut dy) = (cx, cy);
                for _ in 0..quarter_turns {
                    (dx, dy) = (n - 1 - dy, dx);
                }
                let v = if cells[cy][cx] { 25 } else { 230 };
                for yy in 0..cell_px {
                    for xx in 0..cell_px {
                        let x = margin + dx * cell_px + xx;
                        let y = margin + dy * cell_px + yy;
                        data[y * side + x] = v;
                    }
                }
            }
        }
        GrayImage::from_raw(side, side, data).unwrap()
    }

    fn quad_for(cell_px: usize, margin: usize) -> Quad {
        let a = margin as f64;
        let b = (margin + MARKER_CELLS * cell_px) as f64;
        Quad {
            corners: [
                Point2::new(a, a),
                Point2::new(b, a),
                Point2::new(b, b),
                Point2::new(a, b),
            ],
        }
    }

    #[test]
    fn decodes_every_id_and_rotation() {
        let params = FiducialParams::default();
        let matcher = Matcher::new(SHEET_4X4_V1, 2).unwrap();
        let mut dec = MarkerDecoder::new(&params, &matcher);
        for id in 0..4 {
            for rot in 0..4u8 {
                let img = marker_image(id, 10, 12, rot);
                let cand = dec.decode(&img.view(), &quad_for(10, 12)).expect("decoded");
                assert_eq!(cand.id, id);
                assert_eq!(cand.rotation, rot);
                assert_eq!(cand.hamming, 0);
                assert_relative_eq!(cand.border_score, 1.0);
                assert_relative_eq!(cand.center.x, 42.0, epsilon = 1e-9);
                // printed +x turns with the marker
                let expected = match rot {
                    0 => Vector2::new(1.0, 0.0),
                    1 => Vector2::new(0.0, 1.0),
                    2 => Vector2::new(-1.0, 0.0),
                    _ => Vector2::new(0.0, -1.0),
                };
                assert!((cand.x_axis - expected).norm() < 1e-9);
                assert!(cand.confidence > 0.9);
            }
        }
    }

    #[test]
    fn uniform_dark_quad_is_rejected() {
        let params = FiducialParams::default();
        let matcher = Matcher::new(SHEET_4X4_V1, 2).unwrap();
        let mut dec = MarkerDecoder::new(&params, &matcher);
        let side = 84;
        let mut data = vec![230u8; side * side];
        for y in 12..72 {
            for x in 12..72 {
                data[y * side + x] = 20;
            }
        }
        let img = GrayImage::from_raw(side, side, data).unwrap();
        assert!(dec.decode(&img.view(), &quad_for(10, 12)).is_none());
    }
}
