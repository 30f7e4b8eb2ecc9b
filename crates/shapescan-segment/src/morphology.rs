//! Binary opening and closing with square structuring elements.

use image::{GrayImage as LumaImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use shapescan_core::Mask;

fn to_luma(mask: &Mask) -> Option<LumaImage> {
    let data = mask.data.iter().map(|&v| if v != 0 { 255 } else { 0 }).collect();
    LumaImage::from_raw(mask.width as u32, mask.height as u32, data)
}

fn from_luma(img: &LumaImage) -> Mask {
    Mask {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.pixels().map(|&Luma([v])| (v != 0) as u8).collect(),
    }
}

/// Opening with radius `open_px` (removes specks and hairlines), then closing
/// with radius `close_px` (bridges gaps and pinholes). A radius of 0 skips
/// the step. Pixels set in `excluded` are cleared afterwards.
pub fn clean_mask(mask: &Mask, open_px: u8, close_px: u8, excluded: &Mask) -> Mask {
    let Some(mut img) = to_luma(mask) else {
        return mask.clone();
    };
    if open_px > 0 {
        img = open(&img, Norm::LInf, open_px);
    }
    if close_px > 0 {
        img = close(&img, Norm::LInf, close_px);
    }
    let mut out = from_luma(&img);
    for (v, &e) in out.data.iter_mut().zip(&excluded.data) {
        if e != 0 {
            *v = 0;
        }
    }
    out
}

/// Convert a radius in mm to whole pixels for the structuring element.
pub fn radius_px(radius_mm: f64, px_per_mm: f64) -> u8 {
    (radius_mm * px_per_mm).round().clamp(0.0, u8::MAX as f64) as u8
}
