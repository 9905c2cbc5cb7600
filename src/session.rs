//! The lock-guarded decode session.
//!
//! Every seek and every decode goes through one [`DecodeSession`], shared
//! between the reader and the look-ahead thread behind a single mutex. The
//! session owns the decoder, the timestamp reconciler, and the output
//! settings, and implements seek-and-decode-to-target.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    configuration::OutputSettings,
    decoder::{DecodeEvent, Decoder},
    error::FrameServerError,
    frame::RawFrame,
    media_info::MediaInfo,
    timestamp::TimestampReconciler,
};

/// A decode session shared between the reader and the look-ahead thread.
pub(crate) type SharedSession<D> = Arc<Mutex<DecodeSession<D>>>;

/// What a single [`DecodeSession::read_frame`] call should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadRequest {
    /// Seek, then decode forward until the timestamp reaches `target`.
    /// With `approximate`, return the first picture after the seek.
    Seek { target: i64, approximate: bool },
    /// Decode `frames` pictures from the current position and keep the
    /// last one.
    Next { frames: u32 },
}

pub(crate) struct DecodeSession<D: Decoder> {
    decoder: D,
    reconciler: TimestampReconciler,
    output: OutputSettings,
    seek_retry_margin: i64,
    first_read_done: bool,
    first_timestamp: Option<i64>,
}

impl<D: Decoder> DecodeSession<D> {
    pub(crate) fn new(decoder: D, output: OutputSettings, seek_retry_margin_seconds: f64) -> Self {
        let info = decoder.info();
        let reconciler = TimestampReconciler::new(info.timestamps_per_frame);
        let seek_retry_margin = (info.timestamps_per_second * seek_retry_margin_seconds) as i64;

        Self {
            decoder,
            reconciler,
            output,
            seek_retry_margin,
            first_read_done: false,
            first_timestamp: None,
        }
    }

    pub(crate) fn into_shared(self) -> SharedSession<D> {
        Arc::new(Mutex::new(self))
    }

    pub(crate) fn info(&self) -> &MediaInfo {
        self.decoder.info()
    }

    pub(crate) fn set_output(&mut self, output: OutputSettings) {
        self.output = output;
    }

    /// Timestamp of the first frame read from the start of the stream, once.
    pub(crate) fn take_first_timestamp(&mut self) -> Option<i64> {
        self.first_timestamp.take()
    }

    /// Coarse seek without decoding. Failures are logged and swallowed: the
    /// forward decode that follows still lands somewhere usable.
    pub(crate) fn seek(&mut self, target: i64) {
        if let Err(error) = self.decoder.seek(target) {
            log::error!("Error during seek: {error}. Target was [{target}]");
        }
        self.reconciler.reset();
    }

    pub(crate) fn read_frame(&mut self, request: ReadRequest) -> Result<RawFrame, FrameServerError> {
        let (target, frames_to_decode, approximate) = match request {
            ReadRequest::Seek {
                target,
                approximate,
            } => {
                self.seek(target);
                (Some(target), 1, approximate)
            }
            ReadRequest::Next { frames } => (None, frames.max(1), false),
        };

        let mut first_pass = true;
        let mut decoded = 0u32;

        loop {
            let (dts, pts) = match self.decoder.read_next()? {
                DecodeEvent::EndOfStream => return Err(FrameServerError::EndOfStream),
                DecodeEvent::Buffered { dts, pts } => {
                    self.reconciler.buffered(dts, pts);
                    continue;
                }
                DecodeEvent::Decoded { dts, pts } => (dts, pts),
            };

            let timestamp = self.reconciler.decoded(dts, pts);

            let overshot = target.filter(|&target| {
                first_pass && !approximate && target >= 0 && timestamp > target
            });
            if let Some(target) = overshot {
                // The seek landed past the target. Go further back, once.
                first_pass = false;
                let forced = target - self.seek_retry_margin;
                log::debug!(
                    "First decoded frame [{timestamp}] already after target [{target}]. \
                     Forcing seek back to [{forced}]"
                );
                self.seek(forced);
                continue;
            }

            first_pass = false;
            decoded += 1;

            let done = match target {
                Some(target) => approximate || timestamp >= target,
                None => decoded >= frames_to_decode,
            };
            if !done {
                continue;
            }

            if let Some(target) = target.filter(|&target| timestamp != target) {
                log::debug!("Seeking to [{target}] completed. Final position: [{timestamp}]");
            }

            let picture = self.decoder.convert(&self.output).map_err(|error| match error {
                FrameServerError::ImageNotConverted(reason) => {
                    FrameServerError::ImageNotConverted(reason)
                }
                other => FrameServerError::ImageNotConverted(other.to_string()),
            })?;

            self.record_first_read(request, timestamp);
            return Ok(RawFrame::new(timestamp, picture));
        }
    }

    fn record_first_read(&mut self, request: ReadRequest, timestamp: i64) {
        if self.first_read_done {
            return;
        }
        self.first_read_done = true;

        let from_start = match request {
            ReadRequest::Next { .. } => true,
            ReadRequest::Seek { target, .. } => target <= self.decoder.info().first_timestamp,
        };
        if from_start {
            self.first_timestamp = Some(timestamp);
        }
    }
}
