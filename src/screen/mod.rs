pub mod capture;
pub mod scale;

use crate::error::{Result, StreamError};

/// Bytes per pixel in every raster we hand around (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

/// One captured frame, row-major RGBA with no row padding.
///
/// The buffer length always equals `width * height * 4`; `Raster::new` is
/// the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        // None only when the product doesn't fit in usize
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL));
        if width == 0 || height == 0 || expected != Some(data.len()) {
            return Err(StreamError::InvalidRaster {
                width,
                height,
                expected: expected.unwrap_or(usize::MAX),
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Solid-colour raster.
    #[cfg(test)]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let pixels = width as usize * height as usize;
        let data = rgba.repeat(pixels);
        Self::new(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the pixels. Length is fixed, only values may change.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
