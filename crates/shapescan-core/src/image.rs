//! Minimal owned/borrowed raster types.
//!
//! Continuous image coordinates follow one convention everywhere in the
//! workspace: pixel `(i, j)` covers `[i, i+1) × [j, j+1)`, so its center is at
//! `(i + 0.5, j + 0.5)`. Traced boundaries have their vertices on pixel
//! corners in the same frame.

/// Borrowed 8-bit single-channel image, row-major.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

/// Owned 8-bit single-channel image. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) data: Vec<u8>,
}

impl GrayImage {
    /// Wrap a row-major buffer. Returns `None` when the length does not match.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if width.checked_mul(height)? != data.len() {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Borrowed 8-bit RGB image, row-major, 3 bytes per pixel.
#[derive(Clone, Copy, Debug)]
pub struct RgbImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // len = w*h*3
}

impl RgbImageView<'_> {
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Owned 8-bit RGB raster (sRGB). Channel layout and depth are fixed at
/// construction and the buffer cannot be mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) data: Vec<u8>,
}

impl RgbImage {
    /// Wrap a row-major RGB buffer. Returns `None` when the length does not match.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if width.checked_mul(height)?.checked_mul(3)? != data.len() {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        self.view().pixel(x, y)
    }

    pub fn view(&self) -> RgbImageView<'_> {
        RgbImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// Rec.601 luma conversion.
    pub fn to_gray(&self) -> GrayImage {
        let data = self
            .data
            .chunks_exact(3)
            .map(|p| luma(p[0], p[1], p[2]))
            .collect();
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear gray sample at a continuous coordinate. Out-of-image taps read 0.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f64, y: f64) -> f32 {
    let x = x - 0.5;
    let y = y - 0.5;
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Bilinear RGB sample at a continuous coordinate.
///
/// Returns `None` when `(x, y)` lies outside the image rectangle
/// `[0, width] × [0, height]`; taps near the border are clamped to the edge.
#[inline]
pub fn sample_bilinear_rgb(src: &RgbImageView<'_>, x: f64, y: f64) -> Option<[f32; 3]> {
    if !(x >= 0.0 && y >= 0.0 && x <= src.width as f64 && y <= src.height as f64) {
        return None;
    }
    let max_x = src.width as i64 - 1;
    let max_y = src.height as i64 - 1;
    let xs = x - 0.5;
    let ys = y - 0.5;
    let x0 = xs.floor() as i64;
    let y0 = ys.floor() as i64;
    let fx = (xs - x0 as f64) as f32;
    let fy = (ys - y0 as f64) as f32;

    let cx0 = x0.clamp(0, max_x) as usize;
    let cx1 = (x0 + 1).clamp(0, max_x) as usize;
    let cy0 = y0.clamp(0, max_y) as usize;
    let cy1 = (y0 + 1).clamp(0, max_y) as usize;

    let p00 = src.pixel(cx0, cy0);
    let p10 = src.pixel(cx1, cy0);
    let p01 = src.pixel(cx0, cy1);
    let p11 = src.pixel(cx1, cy1);

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let a = p00[c] as f32 + fx * (p10[c] as f32 - p00[c] as f32);
        let b = p01[c] as f32 + fx * (p11[c] as f32 - p01[c] as f32);
        out[c] = a + fy * (b - a);
    }
    Some(out)
}
