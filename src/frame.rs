//! Decoded frames as served to consumers.
//!
//! A [`RawFrame`] pairs a packed [`Picture`] with the reconciled timestamp of
//! the frame it came from. Frames are immutable once produced; containers
//! move them, never modify them.

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::{configuration::PixelFormat, error::FrameServerError};

/// A packed, stride-free output picture.
#[derive(Clone, PartialEq, Eq)]
pub struct Picture {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Layout of `data`.
    pub format: PixelFormat,
    /// `width * height * format.bytes_per_pixel()` bytes, row-major.
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Picture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Picture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Picture {
    /// Allocate a zero-filled picture.
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            data: vec![0; len],
        }
    }

    /// Bytes per row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Convert to an [`image::DynamicImage`].
    ///
    /// BGRA pictures are swizzled to RGBA.
    ///
    /// # Errors
    ///
    /// Returns [`FrameServerError::ImageNotConverted`] if the buffer length
    /// does not match the declared geometry.
    pub fn to_image(&self) -> Result<DynamicImage, FrameServerError> {
        let mismatch = || {
            FrameServerError::ImageNotConverted(format!(
                "buffer of {} bytes does not match {}x{} {:?}",
                self.data.len(),
                self.width,
                self.height,
                self.format
            ))
        };

        let image = match self.format {
            PixelFormat::Rgb8 => DynamicImage::ImageRgb8(
                RgbImage::from_raw(self.width, self.height, self.data.clone())
                    .ok_or_else(mismatch)?,
            ),
            PixelFormat::Rgba8 => DynamicImage::ImageRgba8(
                RgbaImage::from_raw(self.width, self.height, self.data.clone())
                    .ok_or_else(mismatch)?,
            ),
            PixelFormat::Bgra8 => {
                let mut swizzled = self.data.clone();
                for pixel in swizzled.chunks_exact_mut(4) {
                    pixel.swap(0, 2);
                }
                DynamicImage::ImageRgba8(
                    RgbaImage::from_raw(self.width, self.height, swizzled).ok_or_else(mismatch)?,
                )
            }
            PixelFormat::Gray8 => DynamicImage::ImageLuma8(
                GrayImage::from_raw(self.width, self.height, self.data.clone())
                    .ok_or_else(mismatch)?,
            ),
        };

        Ok(image)
    }
}

/// A decoded frame: reconciled timestamp plus output picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Presentation timestamp in stream time-base units.
    pub timestamp: i64,
    /// The converted picture.
    pub picture: Picture,
}

impl RawFrame {
    /// Create a frame from its parts.
    pub fn new(timestamp: i64, picture: Picture) -> Self {
        Self { timestamp, picture }
    }

    /// Approximate heap footprint in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.picture.data.len()
    }
}
