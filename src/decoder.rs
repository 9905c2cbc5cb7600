//! The decoder seam.
//!
//! The frame server never touches a bitstream itself. It drives a
//! [`Decoder`]: something that reads packets sequentially, reports whether
//! each one produced a picture, seeks coarsely, and converts the last
//! picture on request. [`FfmpegDecoder`](crate::FfmpegDecoder) is the
//! production implementation; tests substitute a deterministic one.

use std::path::Path;

use crate::{
    configuration::OutputSettings, error::FrameServerError, frame::Picture,
    media_info::MediaInfo,
};

/// Outcome of feeding one packet to the decoder.
///
/// Hints are the timestamps carried by the packet just fed, in stream time
/// base. They are not necessarily the timestamps of the picture produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeEvent {
    /// The packet was consumed but no picture came out yet.
    Buffered {
        /// Decode timestamp hint.
        dts: Option<i64>,
        /// Presentation timestamp hint.
        pts: Option<i64>,
    },
    /// A picture is ready; [`Decoder::convert`] will return it.
    Decoded {
        /// Decode timestamp hint.
        dts: Option<i64>,
        /// Presentation timestamp hint.
        pts: Option<i64>,
    },
    /// No more pictures.
    EndOfStream,
}

/// A sequential, coarsely seekable video decoder.
///
/// Implementations are moved into a shared session and may be driven from
/// the look-ahead thread, hence `Send + 'static`.
pub trait Decoder: Send + 'static {
    /// Open the media at `path` and probe its facts.
    ///
    /// # Errors
    ///
    /// One of the open-time [`FrameServerError`] variants.
    fn open(path: &Path) -> Result<Self, FrameServerError>
    where
        Self: Sized;

    /// Facts probed at open time.
    fn info(&self) -> &MediaInfo;

    /// Feed the next packet of the video stream.
    ///
    /// # Errors
    ///
    /// [`FrameServerError::FrameNotRead`] on a demuxing or decoding failure.
    fn read_next(&mut self) -> Result<DecodeEvent, FrameServerError>;

    /// Seek to the keyframe at or before `target` (stream time base) and
    /// flush the decoder.
    ///
    /// # Errors
    ///
    /// [`FrameServerError::SeekFailed`] if the demuxer refuses.
    fn seek(&mut self, target: i64) -> Result<(), FrameServerError>;

    /// Convert the most recently decoded picture.
    ///
    /// # Errors
    ///
    /// [`FrameServerError::ImageNotConverted`] if nothing has been decoded
    /// or the conversion fails.
    fn convert(&mut self, settings: &OutputSettings) -> Result<Picture, FrameServerError>;
}
