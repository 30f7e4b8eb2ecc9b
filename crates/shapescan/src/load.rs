//! Upload decoding and normalization.

use std::io::Cursor;

use ::image::codecs::png::PngEncoder;
use ::image::imageops::{self, FilterType};
use ::image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};
use serde::Serialize;
use shapescan_core::{GrayImage, RgbImage};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::LoadParams;
use crate::error::ScanError;

/// A decoded photo, normalized to 8-bit RGB.
#[derive(Clone, Debug)]
pub struct LoadedImage {
    pub image: RgbImage,
    pub info: LoadInfo,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LoadInfo {
    pub format: &'static str,
    /// Size of the encoded image before any downscaling.
    pub original_size: (u32, u32),
    /// Factor applied to the original size (1.0 when kept).
    pub downscale: f64,
}

fn supported_format(bytes: &[u8]) -> Result<(ImageFormat, &'static str), ScanError> {
    match ::image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => Ok((ImageFormat::Jpeg, "jpeg")),
        Ok(ImageFormat::Png) => Ok((ImageFormat::Png, "png")),
        Ok(other) => Err(ScanError::InvalidImage(format!(
            "unsupported format {other:?}; expected JPEG or PNG"
        ))),
        Err(_) => Err(ScanError::InvalidImage(
            "unrecognized data; expected JPEG or PNG".into(),
        )),
    }
}

/// Decode `bytes` into an sRGB 8-bit image whose longer side is at most
/// `max_dimension_px`.
///
/// Alpha is discarded; gray and 16-bit inputs are converted. EXIF
/// orientation is ignored.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(bytes, params), fields(bytes = bytes.len()))
)]
pub fn load_image(bytes: &[u8], params: &LoadParams) -> Result<LoadedImage, ScanError> {
    if bytes.is_empty() {
        return Err(ScanError::InvalidImage("empty upload".into()));
    }
    if bytes.len() > params.max_upload_bytes {
        return Err(ScanError::InvalidImage(format!(
            "upload of {} bytes exceeds the {} byte limit",
            bytes.len(),
            params.max_upload_bytes
        )));
    }
    let (format, format_name) = supported_format(bytes)?;
    let decoded = ImageReader::with_format(Cursor::new(bytes), format)
        .decode()
        .map_err(|e| ScanError::InvalidImage(format!("cannot decode {format_name}: {e}")))?;

    let rgb = decoded.into_rgb8();
    let (w, h) = rgb.dimensions();
    if w.min(h) < params.min_dimension_px {
        return Err(ScanError::InvalidImage(format!(
            "image is {w}x{h}; both sides must be at least {} px",
            params.min_dimension_px
        )));
    }

    let longest = w.max(h);
    let (rgb, downscale) = if longest > params.max_dimension_px {
        let f = params.max_dimension_px as f64 / longest as f64;
        let nw = ((w as f64 * f).round() as u32).max(1);
        let nh = ((h as f64 * f).round() as u32).max(1);
        log::debug!("downscaling {w}x{h} to {nw}x{nh}");
        (imageops::resize(&rgb, nw, nh, FilterType::Triangle), f)
    } else {
        (rgb, 1.0)
    };

    let (nw, nh) = rgb.dimensions();
    let image = RgbImage::from_raw(nw as usize, nh as usize, rgb.into_raw())
        .ok_or_else(|| ScanError::InvalidImage("decoded buffer has the wrong size".into()))?;
    Ok(LoadedImage {
        image,
        info: LoadInfo {
            format: format_name,
            original_size: (w, h),
            downscale,
        },
    })
}

/// Encode an RGB image as PNG.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ::image::ImageError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        image.as_raw(),
        image.width() as u32,
        image.height() as u32,
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

/// Encode a grayscale image as PNG.
pub fn encode_gray_png(image: &GrayImage) -> Result<Vec<u8>, ::image::ImageError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        image.as_raw(),
        image.width() as u32,
        image.height() as u32,
        ExtendedColorType::L8,
    )?;
    Ok(out)
}
