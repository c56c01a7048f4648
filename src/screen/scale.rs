//! Frame shaping: shrink to the pixel budget, then fix up transparent pixels.
//!
//! Order matters. Lanczos resampling blends edge pixels into partial alpha,
//! and those must survive untouched, so alpha normalisation always runs on
//! the already-scaled raster.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use super::Raster;
use crate::error::{Result, StreamError};

/// Target dimensions for fitting `width x height` into `max_pixels`.
///
/// Returns the input dimensions when they already fit. Otherwise one shared
/// factor `sqrt(budget / pixels)` is applied to both axes and each result is
/// rounded and clamped to at least 1. Rounding can overshoot by a few pixels,
/// in which case the longer axis gives way until the product fits.
pub fn fit_dimensions(width: u32, height: u32, max_pixels: u64) -> (u32, u32) {
    let pixels = width as u64 * height as u64;
    if pixels <= max_pixels {
        return (width, height);
    }

    let budget = max_pixels.max(1);
    let factor = (budget as f64 / pixels as f64).sqrt();
    let mut w = ((width as f64 * factor).round() as u64).max(1);
    let mut h = ((height as f64 * factor).round() as u64).max(1);

    while w * h > budget {
        if w >= h {
            w = (budget / h).max(1);
        } else {
            h = (budget / w).max(1);
        }
    }

    (w as u32, h as u32)
}

/// Downscale `raster` so that `width * height <= max_pixels`.
///
/// Rasters that already fit are returned as-is, no resampling.
pub fn scale_to_budget(raster: Raster, max_pixels: u64) -> Result<Raster> {
    if raster.pixel_count() <= max_pixels {
        return Ok(raster);
    }

    let (w, h) = fit_dimensions(raster.width(), raster.height(), max_pixels);
    let (src_w, src_h) = (raster.width(), raster.height());
    let src: RgbaImage = RgbaImage::from_raw(src_w, src_h, raster.into_data())
        .ok_or_else(|| StreamError::capture("raster buffer does not match its dimensions"))?;

    let scaled = imageops::resize(&src, w, h, FilterType::Lanczos3);
    Raster::new(w, h, scaled.into_raw())
}

/// Rewrite every fully transparent pixel to opaque black.
///
/// Receivers treat the colour of `alpha == 0` pixels as garbage, so they get
/// pinned to a known value. Anything with alpha > 0 is left alone.
pub fn normalize_alpha(raster: &mut Raster) {
    for px in raster.pixels_mut().chunks_exact_mut(4) {
        if px[3] == 0 {
            px.copy_from_slice(&[0, 0, 0, 255]);
        }
    }
}
