//! Tagged per-pixel classification of the rectified canvas.

use nalgebra::Point2;
use serde::Serialize;
use shapescan_core::{Mask, RgbImage, ScaleFactor, SheetCorner, SheetLayout};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::background::BackgroundModel;
use crate::params::SegmentParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PixelClass {
    Background = 0,
    Foreground = 1,
    Ambiguous = 2,
}

impl PixelClass {
    /// Pixels that may belong to an object region.
    #[inline]
    pub fn is_candidate(self) -> bool {
        !matches!(self, PixelClass::Background)
    }
}

/// Class of every canvas pixel, row-major.
#[derive(Clone, Debug)]
pub struct ClassMap {
    pub width: usize,
    pub height: usize,
    pub classes: Vec<PixelClass>,
}

impl ClassMap {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> PixelClass {
        self.classes[y * self.width + x]
    }

    pub fn count(&self, class: PixelClass) -> usize {
        self.classes.iter().filter(|&&c| c == class).count()
    }

    /// Foreground or ambiguous pixels.
    pub fn candidate_mask(&self) -> Mask {
        Mask {
            width: self.width,
            height: self.height,
            data: self.classes.iter().map(|c| c.is_candidate() as u8).collect(),
        }
    }
}

/// Map a normalized background distance to a class.
#[inline]
pub fn classify_z(z: f64, params: &SegmentParams) -> PixelClass {
    if z.is_nan() || z >= params.foreground_z {
        PixelClass::Foreground
    } else if z <= params.background_z {
        PixelClass::Background
    } else {
        PixelClass::Ambiguous
    }
}

/// Pixels that can never be object: uncovered, the sheet's border band and
/// the padded marker squares.
pub fn exclusion_mask(
    coverage: &Mask,
    layout: &SheetLayout,
    scale: ScaleFactor,
    params: &SegmentParams,
) -> Mask {
    let zones: Vec<(f64, f64, f64, f64)> = SheetCorner::ALL
        .iter()
        .map(|&c| layout.marker_rect(c, params.marker_padding_mm))
        .collect();
    let b = params.border_mm;
    Mask::from_fn(coverage.width, coverage.height, |x, y| {
        if !coverage.get(x, y) {
            return true;
        }
        let p = scale.px_to_mm(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
        if p.x < b || p.y < b || p.x > layout.width_mm - b || p.y > layout.height_mm - b {
            return true;
        }
        zones
            .iter()
            .any(|&(x0, y0, x1, y1)| p.x >= x0 && p.x <= x1 && p.y >= y0 && p.y <= y1)
    })
}

fn classify_row(
    canvas: &RgbImage,
    excluded: &Mask,
    model: &BackgroundModel,
    scale: ScaleFactor,
    params: &SegmentParams,
    y: usize,
    out: &mut [PixelClass],
) {
    for (x, class) in out.iter_mut().enumerate() {
        *class = if excluded.get(x, y) {
            PixelClass::Background
        } else {
            let p = scale.px_to_mm(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
            classify_z(model.z_score(canvas.pixel(x, y), p.x, p.y), params)
        };
    }
}

/// Classify every canvas pixel against the background model. Excluded
/// pixels are background.
pub fn classify_pixels(
    canvas: &RgbImage,
    excluded: &Mask,
    model: &BackgroundModel,
    scale: ScaleFactor,
    params: &SegmentParams,
) -> ClassMap {
    let (w, h) = (canvas.width(), canvas.height());
    let mut classes = vec![PixelClass::Background; w * h];
    if w > 0 {
        #[cfg(feature = "rayon")]
        classes
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| classify_row(canvas, excluded, model, scale, params, y, row));

        #[cfg(not(feature = "rayon"))]
        classes
            .chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| classify_row(canvas, excluded, model, scale, params, y, row));
    }
    ClassMap {
        width: w,
        height: h,
        classes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapescan_core::ScaleBounds;

    #[test]
    fn z_bands() {
        let p = SegmentParams::default();
        assert_eq!(classify_z(0.0, &p), PixelClass::Background);
        assert_eq!(classify_z(3.0, &p), PixelClass::Background);
        assert_eq!(classify_z(4.5, &p), PixelClass::Ambiguous);
        assert_eq!(classify_z(6.0, &p), PixelClass::Foreground);
        assert_eq!(classify_z(f64::NAN, &p), PixelClass::Foreground);
    }

    #[test]
    fn excluded_zones() {
        let layout = SheetLayout::a4_v1();
        let scale = ScaleFactor::new(1.0, &ScaleBounds::default()).unwrap();
        let coverage = Mask::from_fn(210, 297, |x, _| x < 200);
        let ex = exclusion_mask(&coverage, &layout, scale, &SegmentParams::default());
        assert!(ex.get(2, 100)); // border band
        assert!(ex.get(35, 35)); // marker
        assert!(ex.get(17, 17)); // marker padding
        assert!(ex.get(201, 150)); // uncovered
        assert!(!ex.get(105, 148));
        assert!(!ex.get(100, 10));
    }

    #[test]
    fn classifies_against_model() {
        let scale = ScaleFactor::new(1.0, &ScaleBounds::default()).unwrap();
        let model = BackgroundModel::uniform([200.0; 3], [4.0; 3]);
        let canvas = RgbImage::from_raw(
            3,
            1,
            vec![201, 199, 200, 215, 215, 215, 20, 40, 60],
        )
        .unwrap();
        let excluded = Mask::new(3, 1);
        let map = classify_pixels(&canvas, &excluded, &model, scale, &SegmentParams::default());
        assert_eq!(
            map.classes,
            vec![PixelClass::Background, PixelClass::Ambiguous, PixelClass::Foreground]
        );
        assert_eq!(map.candidate_mask().count(), 2);
    }
}
