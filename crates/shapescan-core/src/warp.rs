//! Perspective resampling into a rectified canvas.
//!
//! Each output row is produced by a pure function of the source image and the
//! homography, so rows can be computed in any order (or in parallel with the
//! `rayon` feature) with bit-identical results.

use nalgebra::Point2;

use crate::homography::Homography;
use crate::image::{sample_bilinear_rgb, RgbImage, RgbImageView};
use crate::mask::Mask;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Output of [`warp_perspective_rgb`]: the canvas and which of its pixels
/// sampled inside the source image.
#[derive(Clone, Debug)]
pub struct Warped {
    pub image: RgbImage,
    pub coverage: Mask,
}

fn warp_row(
    src: &RgbImageView<'_>,
    img_from_canvas: &Homography,
    y: usize,
    rgb: &mut [u8],
    covered: &mut [u8],
) {
    for (x, (px, cov)) in rgb.chunks_exact_mut(3).zip(covered.iter_mut()).enumerate() {
        let p = img_from_canvas.apply(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
        match sample_bilinear_rgb(src, p.x, p.y) {
            Some(v) => {
                for c in 0..3 {
                    px[c] = v[c].round().clamp(0.0, 255.0) as u8;
                }
                *cov = 1;
            }
            None => {
                px.fill(0);
                *cov = 0;
            }
        }
    }
}

/// Resample `src` into an `out_w × out_h` canvas: for each canvas pixel
/// center, map through `img_from_canvas` and sample bilinearly.
pub fn warp_perspective_rgb(
    src: &RgbImageView<'_>,
    img_from_canvas: &Homography,
    out_w: usize,
    out_h: usize,
) -> Warped {
    let mut rgb = vec![0u8; out_w * out_h * 3];
    let mut coverage = vec![0u8; out_w * out_h];

    if out_w > 0 {
        #[cfg(feature = "rayon")]
        rgb.par_chunks_mut(out_w * 3)
            .zip(coverage.par_chunks_mut(out_w))
            .enumerate()
            .for_each(|(y, (row, cov))| warp_row(src, img_from_canvas, y, row, cov));

        #[cfg(not(feature = "rayon"))]
        rgb.chunks_mut(out_w * 3)
            .zip(coverage.chunks_mut(out_w))
            .enumerate()
            .for_each(|(y, (row, cov))| warp_row(src, img_from_canvas, y, row, cov));
    }

    Warped {
        image: RgbImage {
            width: out_w,
            height: out_h,
            data: rgb,
        },
        coverage: Mask {
            width: out_w,
            height: out_h,
            data: coverage,
        },
    }
}
