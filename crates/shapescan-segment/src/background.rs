//! Per-image model of the empty sheet's color.
//!
//! Patches on the sheet margins between the corner markers are sampled; each
//! yields a per-channel median. Outlier patches (covered by the object or a
//! shadow) are dropped, then every channel gets a least-squares plane over
//! the sheet so smooth illumination gradients are absorbed.

use nalgebra::{DMatrix, DVector, Point2, Vector3};
use serde::Serialize;
use shapescan_core::{luma, Mask, RgbImage, ScaleFactor, SheetCorner, SheetLayout};

use crate::error::{NoObjectReason, SegmentError};
use crate::params::SegmentParams;

const MAD_TO_SIGMA: f64 = 1.4826;

/// One background sampling patch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatchSample {
    pub center_mm: Point2<f64>,
    pub median: [u8; 3],
    pub luma: u8,
    pub kept: bool,
}

/// Sheet color as a plane per channel plus a robust per-channel spread.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BackgroundModel {
    /// `(a, b, c)` of `a + b·x + c·y` (x, y in mm) per RGB channel.
    coeffs: [Vector3<f64>; 3],
    sigma: [f64; 3],
    patches: Vec<PatchSample>,
}

impl BackgroundModel {
    /// Model with a constant color, mainly for tests and tooling.
    pub fn uniform(rgb: [f64; 3], sigma: [f64; 3]) -> Self {
        Self {
            coeffs: rgb.map(|c| Vector3::new(c, 0.0, 0.0)),
            sigma,
            patches: Vec::new(),
        }
    }

    #[inline]
    pub fn expected(&self, x_mm: f64, y_mm: f64) -> [f64; 3] {
        self.coeffs.map(|c| c.x + c.y * x_mm + c.z * y_mm)
    }

    pub fn sigma(&self) -> [f64; 3] {
        self.sigma
    }

    pub fn patches(&self) -> &[PatchSample] {
        &self.patches
    }

    /// RMS over channels of the per-channel deviation in units of sigma.
    #[inline]
    pub fn z_score(&self, rgb: [u8; 3], x_mm: f64, y_mm: f64) -> f64 {
        let mu = self.expected(x_mm, y_mm);
        let mut acc = 0.0;
        for c in 0..3 {
            let d = (rgb[c] as f64 - mu[c]) / self.sigma[c];
            acc += d * d;
        }
        (acc / 3.0).sqrt()
    }
}

/// Patch centers in sheet mm: `patches_per_side` along each side, on the
/// line through the marker centers, evenly spaced between the padded
/// markers.
pub fn patch_centers(layout: &SheetLayout, params: &SegmentParams) -> Vec<Point2<f64>> {
    let n = params.patches_per_side;
    let pad = params.marker_padding_mm + 0.5 * params.patch_mm;
    let c = |corner| layout.marker_center(corner);
    let rect = |corner| layout.marker_rect(corner, 0.0);

    use SheetCorner::*;
    // (marker center on the side's line, free span start, free span end, horizontal)
    let sides = [
        (c(TopLeft), rect(TopLeft).2, rect(TopRight).0, true),
        (c(TopRight), rect(TopRight).3, rect(BottomRight).1, false),
        (c(BottomLeft), rect(BottomLeft).2, rect(BottomRight).0, true),
        (c(TopLeft), rect(TopLeft).3, rect(BottomLeft).1, false),
    ];

    let mut out = Vec::with_capacity(4 * n);
    for (anchor, from, to, horizontal) in sides {
        let (a, b) = (from + pad, to - pad);
        for k in 0..n {
            let t = if b > a {
                a + (b - a) * (k as f64 + 1.0) / (n as f64 + 1.0)
            } else {
                0.5 * (from + to)
            };
            out.push(if horizontal {
                Point2::new(t, anchor.y)
            } else {
                Point2::new(anchor.x, t)
            });
        }
    }
    out
}

fn median_u8(hist: &[u32; 256], n: u32) -> u8 {
    let half = n.div_ceil(2);
    let mut acc = 0u32;
    for (v, &h) in hist.iter().enumerate() {
        acc += h;
        if acc >= half {
            return v as u8;
        }
    }
    255
}

fn median_f64(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let m = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[m - 1] + values[m])
    } else {
        values[m]
    }
}

/// Canvas pixel rectangle `[x0, x1) × [y0, y1)` of a patch.
fn patch_rect(
    center: Point2<f64>,
    params: &SegmentParams,
    scale: ScaleFactor,
    w: usize,
    h: usize,
) -> (usize, usize, usize, usize) {
    let half = 0.5 * params.patch_mm;
    let to_px = |mm: f64, max: usize| (scale.mm_to_px_len(mm).round().max(0.0) as usize).min(max);
    (
        to_px(center.x - half, w),
        to_px(center.y - half, h),
        to_px(center.x + half, w),
        to_px(center.y + half, h),
    )
}

/// Estimate the background model of a rectified canvas.
pub fn estimate_background(
    canvas: &RgbImage,
    coverage: &Mask,
    layout: &SheetLayout,
    scale: ScaleFactor,
    params: &SegmentParams,
) -> Result<BackgroundModel, SegmentError> {
    let (w, h) = (canvas.width(), canvas.height());
    let centers = patch_centers(layout, params);

    let mut patches = Vec::with_capacity(centers.len());
    let mut rects = Vec::with_capacity(centers.len());
    for center in centers {
        let (x0, y0, x1, y1) = patch_rect(center, params, scale, w, h);
        let mut hist = [[0u32; 256]; 3];
        let mut n = 0u32;
        for y in y0..y1 {
            for x in x0..x1 {
                if !coverage.get(x, y) {
                    continue;
                }
                let p = canvas.pixel(x, y);
                for c in 0..3 {
                    hist[c][p[c] as usize] += 1;
                }
                n += 1;
            }
        }
        let total = (x1 - x0) * (y1 - y0);
        if total == 0 || (n as usize) * 2 < total {
            log::debug!("background patch at {center:?} mm is mostly outside the photo");
            continue;
        }
        let median = [0, 1, 2].map(|c| median_u8(&hist[c], n));
        patches.push(PatchSample {
            center_mm: center,
            median,
            luma: luma(median[0], median[1], median[2]),
            kept: true,
        });
        rects.push((x0, y0, x1, y1));
    }

    let mut lumas: Vec<f64> = patches.iter().map(|p| p.luma as f64).collect();
    let m = median_f64(&mut lumas);
    let mut devs: Vec<f64> = patches.iter().map(|p| (p.luma as f64 - m).abs()).collect();
    let spread = (MAD_TO_SIGMA * median_f64(&mut devs)).max(params.patch_spread_floor);
    for p in &mut patches {
        p.kept = (p.luma as f64 - m).abs() <= params.patch_outlier_sigma * spread;
    }

    let usable = patches.iter().filter(|p| p.kept).count();
    log::debug!(
        "background: {usable} of {} patches kept (median luma {m:.0}, spread {spread:.1})",
        patches.len()
    );
    if usable < params.min_patches {
        return Err(SegmentError::NoObjectDetected(
            NoObjectReason::BackgroundUnsampled {
                usable,
                required: params.min_patches,
            },
        ));
    }

    let kept: Vec<&PatchSample> = patches.iter().filter(|p| p.kept).collect();
    let design = DMatrix::from_fn(kept.len(), 3, |r, c| match c {
        0 => 1.0,
        1 => kept[r].center_mm.x,
        _ => kept[r].center_mm.y,
    });
    let svd = design.svd(true, true);
    let mut coeffs = [Vector3::zeros(); 3];
    for (c, coeff) in coeffs.iter_mut().enumerate() {
        let b = DVector::from_iterator(kept.len(), kept.iter().map(|p| p.median[c] as f64));
        let mean = b.mean();
        *coeff = match svd.solve(&b, 1e-9) {
            Ok(x) if x.iter().all(|v| v.is_finite()) => Vector3::new(x[0], x[1], x[2]),
            _ => Vector3::new(mean, 0.0, 0.0),
        };
    }

    let mut model = BackgroundModel {
        coeffs,
        sigma: [params.sigma_floor; 3],
        patches: Vec::new(),
    };

    let mut residuals: [Vec<f64>; 3] = Default::default();
    for (p, &(x0, y0, x1, y1)) in patches.iter().zip(&rects) {
        if !p.kept {
            continue;
        }
        for y in y0..y1 {
            for x in x0..x1 {
                if !coverage.get(x, y) {
                    continue;
                }
                let mm = scale.px_to_mm(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
                let mu = model.expected(mm.x, mm.y);
                let px = canvas.pixel(x, y);
                for c in 0..3 {
                    residuals[c].push(px[c] as f64 - mu[c]);
                }
            }
        }
    }
    for c in 0..3 {
        let r = &mut residuals[c];
        let med = median_f64(r);
        for v in r.iter_mut() {
            *v = (*v - med).abs();
        }
        let mad = median_f64(r);
        model.sigma[c] = (MAD_TO_SIGMA * mad).max(params.sigma_floor);
    }
    model.patches = patches;

    log::debug!(
        "background plane at sheet center {:?}, sigma {:?}",
        model.expected(0.5 * layout.width_mm, 0.5 * layout.height_mm),
        model.sigma
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use shapescan_core::ScaleBounds;

    fn canvas_with(
        layout: &SheetLayout,
        scale: ScaleFactor,
        f: impl Fn(f64, f64) -> [u8; 3],
    ) -> (RgbImage, Mask) {
        let w = scale.mm_to_px_len(layout.width_mm).round() as usize;
        let h = scale.mm_to_px_len(layout.height_mm).round() as usize;
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let mm = scale.px_to_mm(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
                data.extend_from_slice(&f(mm.x, mm.y));
            }
        }
        let coverage = Mask::from_fn(w, h, |_, _| true);
        (RgbImage::from_raw(w, h, data).unwrap(), coverage)
    }

    #[test]
    fn patches_avoid_markers() {
        let layout = SheetLayout::a4_v1();
        let params = SegmentParams::default();
        let centers = patch_centers(&layout, &params);
        assert_eq!(centers.len(), 12);
        assert_relative_eq!(centers[0].x, 82.5);
        assert_relative_eq!(centers[0].y, 35.0);
        for c in &centers {
            for corner in SheetCorner::ALL {
                let (x0, y0, x1, y1) = layout.marker_rect(corner, params.marker_padding_mm);
                let half = 0.5 * params.patch_mm;
                let overlap = c.x + half > x0 && c.x - half < x1 && c.y + half > y0 && c.y - half < y1;
                assert!(!overlap, "patch {c:?} overlaps {corner:?}");
            }
        }
    }

    #[test]
    fn recovers_illumination_gradient() {
        let layout = SheetLayout::a4_v1();
        let scale = ScaleFactor::new(2.0, &ScaleBounds::default()).unwrap();
        let shade = |x: f64, y: f64| 180.0 + 0.2 * x + 0.1 * y;
        let (canvas, coverage) = canvas_with(&layout, scale, |x, y| {
            let v = shade(x, y).round() as u8;
            [v, v, v.saturating_sub(10)]
        });
        let model =
            estimate_background(&canvas, &coverage, &layout, scale, &SegmentParams::default())
                .unwrap();
        let e = model.expected(105.0, 148.5);
        assert!((e[0] - shade(105.0, 148.5)).abs() < 1.5, "{e:?}");
        assert!((e[2] - (shade(105.0, 148.5) - 10.0)).abs() < 1.5);
        assert_eq!(model.sigma(), [4.0; 3]);
    }

    #[test]
    fn drops_patch_under_object() {
        let layout = SheetLayout::a4_v1();
        let scale = ScaleFactor::new(2.0, &ScaleBounds::default()).unwrap();
        // dark object over the first top patch
        let (canvas, coverage) = canvas_with(&layout, scale, |x, y| {
            if (70.0..90.0).contains(&x) && (25.0..45.0).contains(&y) {
                [30, 30, 30]
            } else {
                [230, 225, 220]
            }
        });
        let model =
            estimate_background(&canvas, &coverage, &layout, scale, &SegmentParams::default())
                .unwrap();
        assert_eq!(model.patches().iter().filter(|p| !p.kept).count(), 1);
        assert!((model.expected(80.0, 35.0)[0] - 230.0).abs() < 0.5);
    }

    #[test]
    fn uncovered_sheet_cannot_be_sampled() {
        let layout = SheetLayout::a4_v1();
        let scale = ScaleFactor::new(2.0, &ScaleBounds::default()).unwrap();
        let (canvas, _) = canvas_with(&layout, scale, |_, _| [200, 200, 200]);
        let coverage = Mask::new(canvas.width(), canvas.height());
        let err = estimate_background(&canvas, &coverage, &layout, scale, &SegmentParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SegmentError::NoObjectDetected(NoObjectReason::BackgroundUnsampled { usable: 0, .. })
        ));
    }
}
