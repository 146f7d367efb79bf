use std::path::Path;

use crate::coords::Extent;
use crate::error::TextureError;

use super::Color;

/// Decoded RGBA8 pixels ready for upload, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl ImageData {
    pub const CHANNELS: u32 = 4;

    /// Wraps a raw `width × height × 4` buffer.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::ZeroSize { width, height });
        }
        let expected = width as usize * height as usize * Self::CHANNELS as usize;
        if pixels.len() != expected {
            return Err(TextureError::SizeMismatch { expected, actual: pixels.len() });
        }
        Ok(Self { width, height, pixels })
    }

    /// Decodes an encoded image (PNG, JPEG, BMP, ...) and converts it to RGBA8.
    pub fn decode(bytes: &[u8]) -> Result<Self, TextureError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.into_raw())
    }

    /// Reads and decodes an image file; the format is guessed from the path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.into_raw())
    }

    /// Image filled with one color.
    pub fn solid(width: u32, height: u32, color: Color) -> Result<Self, TextureError> {
        let texel = color.to_packed().to_le_bytes();
        let count = width as usize * height as usize;
        Self::from_rgba(width, height, texel.repeat(count))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Dimensions of an uploaded texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    /// Always 4 (RGBA).
    pub channels: u32,
}

impl From<&ImageData> for TextureInfo {
    fn from(image: &ImageData) -> Self {
        Self { width: image.width, height: image.height, channels: ImageData::CHANNELS }
    }
}
