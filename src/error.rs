//! Error types for the `frameserver` crate.
//!
//! This module defines [`FrameServerError`], the unified error type returned
//! by all fallible operations in the crate. Open-time failures carry the path
//! and upstream reason; read-time failures carry a short description of what
//! the decoder reported.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `frameserver` operations.
///
/// Every public method that can fail returns `Result<T, FrameServerError>`.
/// Open-time variants are fatal to the open attempt only. Read-time variants
/// ([`FrameNotRead`](FrameServerError::FrameNotRead),
/// [`ImageNotConverted`](FrameServerError::ImageNotConverted)) abort the
/// current read and leave the reader usable.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameServerError {
    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoReader::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// Stream information could not be read from the container.
    #[error("Stream information not found")]
    StreamInfoNotFound,

    /// The file does not contain a usable video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// No decoder is available for the video codec.
    #[error("No decoder found for the video codec")]
    CodecNotFound,

    /// The decoder exists but failed to initialise.
    #[error("Video decoder could not be opened: {0}")]
    CodecNotOpened(String),

    /// The container reports a zero or negative duration.
    #[error("Duration information not found")]
    DurationNotFound,

    /// The operation is not enabled by the current capability set or mode.
    #[error("Capability not supported: {0}")]
    CapabilityNotSupported(&'static str),

    /// The reader has no media loaded.
    #[error("No media loaded")]
    NotLoaded,

    /// A frame could not be read from the stream.
    #[error("Failed to read frame: {0}")]
    FrameNotRead(String),

    /// A decoded frame could not be converted to the output picture.
    #[error("Failed to convert decoded frame: {0}")]
    ImageNotConverted(String),

    /// The decoder has no more frames.
    #[error("End of stream")]
    EndOfStream,

    /// A seek request was refused by the demuxer.
    #[error("Seek to timestamp {0} failed")]
    SeekFailed(i64),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for FrameServerError {
    fn from(error: FfmpegError) -> Self {
        FrameServerError::FfmpegError(error.to_string())
    }
}
