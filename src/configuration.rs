//! Reader and import configuration.
//!
//! [`ReaderOptions`] carries the settings a [`VideoReader`](crate::VideoReader)
//! consults for its whole lifetime: working-zone budgets, look-ahead capacity,
//! output picture format, and the two tuning constants for very short media
//! and under-seeking streams. [`ImportOptions`] threads a progress callback
//! and a cancellation token through cache imports without polluting the
//! [`update_working_zone`](crate::VideoReader::update_working_zone) signature.
//!
//! # Example
//!
//! ```no_run
//! use frameserver::{AspectRatioMode, DecodeQuality, ReaderOptions};
//!
//! let options = ReaderOptions::new()
//!     .with_max_working_zone_seconds(20)
//!     .with_max_working_zone_memory_mb(1024)
//!     .with_lookahead_capacity(16)
//!     .with_decode_quality(DecodeQuality::High)
//!     .with_aspect_ratio(AspectRatioMode::Force16x9);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use ffmpeg_next::{format::Pixel, software::scaling::Flags as ScalingFlags};

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Output pixel format for decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit BGRA (32 bpp), the usual layout for display surfaces. This is
    /// the default.
    #[default]
    Bgra8,
    /// 8-bit RGB (24 bpp).
    Rgb8,
    /// 8-bit RGBA with alpha pre-set to 255 (32 bpp).
    Rgba8,
    /// 8-bit grayscale (8 bpp).
    Gray8,
}

impl PixelFormat {
    /// Number of bytes per pixel in the packed output buffer.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Map to the corresponding FFmpeg pixel format constant.
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Bgra8 => Pixel::BGRA,
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Rgba8 => Pixel::RGBA,
            PixelFormat::Gray8 => Pixel::GRAY8,
        }
    }
}

/// Speed/quality trade-off of the rescaling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeQuality {
    /// Fast bilinear; for playback on slow machines.
    Fast,
    /// Bilinear. This is the default.
    #[default]
    Balanced,
    /// Bicubic; for frame-by-frame analysis and export.
    High,
}

impl DecodeQuality {
    pub(crate) fn to_scaling_flags(self) -> ScalingFlags {
        match self {
            DecodeQuality::Fast => ScalingFlags::FAST_BILINEAR,
            DecodeQuality::Balanced => ScalingFlags::BILINEAR,
            DecodeQuality::High => ScalingFlags::BICUBIC,
        }
    }
}

/// How the display geometry is derived from the coded picture size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatioMode {
    /// Use the pixel aspect ratio declared by the stream.
    #[default]
    Auto,
    /// Force a 4:3 display aspect ratio.
    Force4x3,
    /// Force a 16:9 display aspect ratio.
    Force16x9,
    /// Ignore any declared pixel aspect ratio.
    ForcedSquarePixels,
}

impl AspectRatioMode {
    /// Resolve the display size for a coded picture.
    ///
    /// The width is kept and the height is adjusted to match the mode.
    pub fn resolve(self, width: u32, height: u32, pixel_aspect_ratio: f64) -> (u32, u32) {
        let adjusted = match self {
            AspectRatioMode::Force4x3 => (width as f64 * 3.0 / 4.0) as u32,
            AspectRatioMode::Force16x9 => (width as f64 * 9.0 / 16.0) as u32,
            AspectRatioMode::ForcedSquarePixels => height,
            AspectRatioMode::Auto if pixel_aspect_ratio > 0.0 => {
                (height as f64 / pixel_aspect_ratio) as u32
            }
            AspectRatioMode::Auto => height,
        };
        (width, adjusted.max(1))
    }
}

/// The picture the decoder is asked to produce for every kept frame.
///
/// Deinterlacing happens before rescaling to `width` × `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Packed output pixel layout.
    pub pixel_format: PixelFormat,
    /// Rescaling quality.
    pub quality: DecodeQuality,
    /// Blend interlaced fields before rescaling.
    pub deinterlace: bool,
}

impl OutputSettings {
    /// Estimated size in bytes of one output picture.
    pub fn frame_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.pixel_format.bytes_per_pixel() as u64
    }
}

/// Configuration for a [`VideoReader`](crate::VideoReader).
///
/// All fields have sensible defaults; a default-constructed value is what
/// [`ReaderOptions::new`] returns.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub(crate) max_working_zone_seconds: u32,
    pub(crate) max_working_zone_memory_mb: u32,
    pub(crate) lookahead_capacity: usize,
    pub(crate) decode_quality: DecodeQuality,
    pub(crate) deinterlace: bool,
    pub(crate) aspect_ratio: AspectRatioMode,
    pub(crate) pixel_format: PixelFormat,
    pub(crate) very_short_threshold_frames: u64,
    pub(crate) seek_retry_margin_seconds: f64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderOptions {
    /// Create options with default settings.
    ///
    /// Defaults: 12 s / 512 MB working-zone budget, 10-frame look-ahead,
    /// balanced quality, no deinterlacing, automatic aspect ratio, BGRA
    /// output, 50-frame very-short threshold, 4 s seek retry margin.
    pub fn new() -> Self {
        Self {
            max_working_zone_seconds: 12,
            max_working_zone_memory_mb: 512,
            lookahead_capacity: 10,
            decode_quality: DecodeQuality::Balanced,
            deinterlace: false,
            aspect_ratio: AspectRatioMode::Auto,
            pixel_format: PixelFormat::Bgra8,
            very_short_threshold_frames: 50,
            seek_retry_margin_seconds: 4.0,
        }
    }

    /// Longest working zone, in seconds, that may be cached in full.
    #[must_use]
    pub fn with_max_working_zone_seconds(mut self, seconds: u32) -> Self {
        self.max_working_zone_seconds = seconds;
        self
    }

    /// Memory budget, in megabytes, for a fully cached working zone.
    #[must_use]
    pub fn with_max_working_zone_memory_mb(mut self, megabytes: u32) -> Self {
        self.max_working_zone_memory_mb = megabytes;
        self
    }

    /// Number of frames the look-ahead window holds. Clamped to at least 2.
    #[must_use]
    pub fn with_lookahead_capacity(mut self, capacity: usize) -> Self {
        self.lookahead_capacity = capacity.max(2);
        self
    }

    /// Set the rescaling quality.
    #[must_use]
    pub fn with_decode_quality(mut self, quality: DecodeQuality) -> Self {
        self.decode_quality = quality;
        self
    }

    /// Enable or disable deinterlacing.
    #[must_use]
    pub fn with_deinterlace(mut self, deinterlace: bool) -> Self {
        self.deinterlace = deinterlace;
        self
    }

    /// Set the aspect ratio mode.
    #[must_use]
    pub fn with_aspect_ratio(mut self, mode: AspectRatioMode) -> Self {
        self.aspect_ratio = mode;
        self
    }

    /// Set the output pixel format.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Media with at most this many frames are cached whole at open time
    /// and get no other decoding mode.
    #[must_use]
    pub fn with_very_short_threshold(mut self, frames: u64) -> Self {
        self.very_short_threshold_frames = frames;
        self
    }

    /// How far before the target, in seconds, the second seek lands when a
    /// stream overshoots the first one.
    #[must_use]
    pub fn with_seek_retry_margin(mut self, seconds: f64) -> Self {
        self.seek_retry_margin_seconds = seconds.max(0.0);
        self
    }

    /// The current look-ahead capacity.
    pub fn lookahead_capacity(&self) -> usize {
        self.lookahead_capacity
    }

    /// Whether deinterlacing is enabled.
    pub fn deinterlace(&self) -> bool {
        self.deinterlace
    }

    /// The current aspect ratio mode.
    pub fn aspect_ratio(&self) -> AspectRatioMode {
        self.aspect_ratio
    }
}

/// Configuration for cache imports.
///
/// Carries the progress callback and cancellation token of the worker that
/// runs the import. A default-constructed value never cancels and reports
/// nowhere.
#[derive(Clone)]
pub struct ImportOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) batch_size: u64,
}

impl Debug for ImportOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ImportOptions")
            .field("has_progress", &true)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportOptions {
    /// Create import options with no progress callback, no cancellation and
    /// a batch size of 1.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, the import clears the cache and the
    /// reader falls back to the best non-caching mode.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
