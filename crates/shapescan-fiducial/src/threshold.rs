//! Global and local thresholds.

use shapescan_core::{GrayImageView, Mask};

/// Otsu threshold over a set of samples; values `< t` are the dark class.
pub(crate) fn otsu_threshold(samples: &[u8]) -> u8 {
    let Some((&first, _)) = samples.split_first() else {
        return 127;
    };
    let (min_v, max_v) = samples
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min_v == max_v {
        return min_v;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v as u16 + max_v as u16 + 1) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;
    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }
        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;
        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            // first value of the bright class
            best_t = (t + 1).min(255) as u8;
        }
    }
    best_t
}

/// Odd window sizes from fractions of the shorter image side, clamped to
/// `[min_px, max_px]`, deduplicated, in ascending order.
pub(crate) fn window_sizes(short_side: usize, fractions: &[f64], min_px: usize, max_px: usize) -> Vec<usize> {
    let mut out: Vec<usize> = fractions
        .iter()
        .filter(|f| f.is_finite() && **f > 0.0)
        .map(|f| {
            let w = (short_side as f64 * f).round() as usize;
            let w = w.clamp(min_px, max_px.max(min_px));
            w | 1
        })
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Summed-area table with a zero row/column in front.
struct Integral {
    stride: usize,
    sums: Vec<u64>,
}

impl Integral {
    fn new(img: &GrayImageView<'_>) -> Self {
        let stride = img.width + 1;
        let mut sums = vec![0u64; stride * (img.height + 1)];
        for y in 0..img.height {
            let mut row = 0u64;
            for x in 0..img.width {
                row += img.data[y * img.width + x] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    /// Sum over `[x0, x1) × [y0, y1)`.
    #[inline]
    fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let s = self.stride;
        self.sums[y1 * s + x1] + self.sums[y0 * s + x0] - self.sums[y0 * s + x1] - self.sums[y1 * s + x0]
    }
}

/// Local-mean thresholds, one mask per window: a pixel is dark when it is
/// more than `offset` below the mean of the `window × window` box around
/// it (clipped at the image border).
pub(crate) fn adaptive_dark_masks(img: &GrayImageView<'_>, windows: &[usize], offset: f64) -> Vec<Mask> {
    let integral = Integral::new(img);
    let (w, h) = (img.width, img.height);
    windows
        .iter()
        .map(|&win| {
            let r = win / 2;
            let mut mask = Mask::new(w, h);
            for y in 0..h {
                let y0 = y.saturating_sub(r);
                let y1 = (y + r + 1).min(h);
                for x in 0..w {
                    let x0 = x.saturating_sub(r);
                    let x1 = (x + r + 1).min(w);
                    let n = ((x1 - x0) * (y1 - y0)) as f64;
                    let mean = integral.sum(x0, y0, x1, y1) as f64 / n;
                    if (img.data[y * w + x] as f64) < mean - offset {
                        mask.data[y * w + x] = 1;
                    }
                }
            }
            mask
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapescan_core::GrayImage;

    #[test]
    fn otsu_splits_bimodal_samples() {
        let mut s = vec![20u8; 50];
        s.extend(std::iter::repeat(30).take(10));
        s.extend(std::iter::repeat(200).take(40));
        s.extend(std::iter::repeat(220).take(10));
        let t = otsu_threshold(&s);
        assert!(t > 30 && t <= 200, "t = {t}");
    }

    #[test]
    fn otsu_degenerate_inputs() {
        assert_eq!(otsu_threshold(&[]), 127);
        assert_eq!(otsu_threshold(&[9, 9, 9]), 9);
        assert_eq!(otsu_threshold(&[0, 255]), 128);
    }

    #[test]
    fn window_sizes_are_odd_and_clamped() {
        assert_eq!(window_sizes(3000, &[1.0 / 40.0, 1.0 / 15.0], 15, 301), vec![75, 201]);
        assert_eq!(window_sizes(200, &[1.0 / 40.0], 15, 301), vec![15]);
        assert_eq!(window_sizes(20000, &[0.5], 15, 301), vec![301]);
    }

    #[test]
    fn dark_square_on_light_background_is_dark_under_local_mean() {
        let (w, h) = (40, 40);
        let mut data = vec![200u8; w * h];
        for y in 15..25 {
            for x in 15..25 {
                data[y * w + x] = 30;
            }
        }
        let img = GrayImage::from_raw(w, h, data).unwrap();
        let masks = adaptive_dark_masks(&img.view(), &[15], 10.0);
        let m = &masks[0];
        assert!(m.get(15, 15));
        assert!(m.get(20, 15));
        assert!(!m.get(2, 2));
        assert!(!m.get(14, 14));
    }
}
