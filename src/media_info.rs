//! Media facts, capabilities and decoding modes.
//!
//! [`MediaInfo`] is built once when a file is opened and never changes
//! afterwards, except for the first timestamp, which is corrected by the
//! first frame actually decoded. [`Capabilities`] is derived from it and
//! gates which [`DecodingMode`] transitions and operations a
//! [`VideoReader`](crate::VideoReader) accepts.

use std::path::PathBuf;

/// Facts about the opened video stream.
///
/// All timestamps are in the stream's own time base.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct MediaInfo {
    /// Path the media was opened from.
    pub path: PathBuf,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
    /// Codec name (e.g. `"h264"`).
    pub codec: String,
    /// Coded picture width in pixels.
    pub width: u32,
    /// Coded picture height in pixels.
    pub height: u32,
    /// Width over height of one pixel. 1.0 for square pixels.
    pub pixel_aspect_ratio: f64,
    /// Average frames per second, after the estimation chain.
    pub frames_per_second: f64,
    /// How [`frames_per_second`](Self::frames_per_second) was obtained.
    pub frame_rate_source: FrameRateSource,
    /// Stream time-base ticks per second.
    pub timestamps_per_second: f64,
    /// Stream time-base ticks per frame, rounded.
    pub timestamps_per_frame: i64,
    /// Total duration in stream ticks.
    pub duration: i64,
    /// Timestamp of the first frame.
    pub first_timestamp: i64,
}

impl MediaInfo {
    /// Average frame interval in milliseconds.
    pub fn frame_interval_ms(&self) -> f64 {
        if self.frames_per_second > 0.0 {
            1000.0 / self.frames_per_second
        } else {
            0.0
        }
    }

    /// Estimated number of frames in the stream.
    pub fn estimated_frame_count(&self) -> u64 {
        if self.timestamps_per_frame > 0 {
            (self.duration / self.timestamps_per_frame).max(0) as u64
        } else {
            0
        }
    }

    /// Whether the stream has so few frames it should be cached whole.
    pub fn is_very_short(&self, threshold_frames: u64) -> bool {
        self.estimated_frame_count() <= threshold_frames
    }

    /// Timestamp of the last frame, estimated from the duration.
    pub fn last_timestamp(&self) -> i64 {
        self.first_timestamp + self.duration - self.timestamps_per_frame
    }

    /// Convert a timestamp to seconds from the start of the stream.
    pub fn timestamp_to_seconds(&self, timestamp: i64) -> f64 {
        if self.timestamps_per_second > 0.0 {
            (timestamp - self.first_timestamp) as f64 / self.timestamps_per_second
        } else {
            0.0
        }
    }

    /// Emit a debug dump of every fact.
    pub(crate) fn log_summary(&self) {
        log::debug!("---------------------------------------------------");
        log::debug!("[File] {}", self.path.display());
        log::debug!("[Container] {}", self.format);
        log::debug!("[Codec] {} {}x{}", self.codec, self.width, self.height);
        log::debug!("[Codec] Pixel aspect ratio: {}", self.pixel_aspect_ratio);
        log::debug!(
            "[Stream] Duration: {} timestamps ({:.3} s)",
            self.duration,
            self.duration as f64 / self.timestamps_per_second.max(f64::MIN_POSITIVE)
        );
        log::debug!("[Stream] First timestamp: {}", self.first_timestamp);
        log::debug!(
            "[Stream] Average timestamps per second: {}",
            self.timestamps_per_second
        );
        log::debug!(
            "Average fps: {} ({:?}), interval {:.3} ms, {} timestamps per frame",
            self.frames_per_second,
            self.frame_rate_source,
            self.frame_interval_ms(),
            self.timestamps_per_frame
        );
        log::debug!("---------------------------------------------------");
    }
}

/// Which step of the estimation chain produced the frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRateSource {
    /// The demuxer's average frame rate.
    Average,
    /// Stream frame count divided by container duration.
    Durations,
    /// The stream time base, when it looks like a frame rate.
    StreamTimeBase,
    /// The codec time base, when it looks like a frame rate.
    CodecTimeBase,
    /// A known 1001-denominator rate misreported as an integer.
    SpecialCase,
    /// Nothing usable; forced to 25 fps.
    Fallback,
}

/// Raw inputs to the frame-rate estimation chain.
///
/// Time bases are expressed as ticks per second (`den / num`); zero means
/// unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameRateHints {
    /// Demuxer average frame rate, 0.0 if unknown.
    pub average_frame_rate: f64,
    /// Number of frames the stream declares, 0 if unknown.
    pub stream_frame_count: i64,
    /// Container duration in microseconds, 0 if unknown.
    pub duration_microseconds: i64,
    /// Stream time-base ticks per second.
    pub stream_ticks_per_second: f64,
    /// Codec time-base ticks per second.
    pub codec_ticks_per_second: f64,
}

/// Estimate the average frame rate, falling through progressively weaker
/// sources.
///
/// Time bases of 1000 ticks per second or more are rejected as frame rates,
/// except for the 30000 and 25000 special cases.
pub fn estimate_frames_per_second(hints: &FrameRateHints) -> (f64, FrameRateSource) {
    if hints.average_frame_rate > 0.0 {
        return (hints.average_frame_rate, FrameRateSource::Average);
    }

    if hints.stream_frame_count > 0 && hints.duration_microseconds > 0 {
        let fps = hints.stream_frame_count as f64 * 1_000_000.0 / hints.duration_microseconds as f64;
        return (fps, FrameRateSource::Durations);
    }

    if hints.stream_ticks_per_second > 0.0 && hints.stream_ticks_per_second < 1000.0 {
        return (hints.stream_ticks_per_second, FrameRateSource::StreamTimeBase);
    }

    let codec = hints.codec_ticks_per_second;
    if codec > 0.0 && codec < 1000.0 {
        (codec, FrameRateSource::CodecTimeBase)
    } else if codec == 30000.0 {
        (29.97, FrameRateSource::SpecialCase)
    } else if codec == 25000.0 {
        (24.975, FrameRateSource::SpecialCase)
    } else {
        (25.0, FrameRateSource::Fallback)
    }
}

/// Pixel aspect ratio from a sample aspect ratio.
///
/// MPEG-2 streams store the display aspect ratio in that field instead, so
/// the pixel ratio is recovered from the coded size.
pub fn pixel_aspect_ratio(
    sample_numerator: i32,
    sample_denominator: i32,
    width: u32,
    height: u32,
    is_mpeg2: bool,
) -> f64 {
    if sample_numerator == 0 || sample_denominator == 0 || sample_numerator == sample_denominator {
        return 1.0;
    }

    let ratio = sample_numerator as f64 / sample_denominator as f64;
    if !is_mpeg2 || width == 0 {
        return ratio;
    }

    let par = height as f64 * ratio / width as f64;
    if par < 1.0 { ratio } else { par }
}

/// The active frame-serving strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodingMode {
    /// No media loaded.
    #[default]
    Uninitialized,
    /// Every request is a synchronous decode into a single-frame slot.
    OnDemand,
    /// A background thread keeps a bounded window of upcoming frames.
    PreBuffering,
    /// The whole working zone is held in memory.
    Caching,
}

/// What a given media allows the reader to do.
///
/// Computed once at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Synchronous single-frame decoding.
    pub decode_on_demand: bool,
    /// Look-ahead production on a background thread.
    pub pre_buffer: bool,
    /// Full working-zone caching.
    pub cache: bool,
    /// Working zone may be changed by the caller.
    pub change_working_zone: bool,
    /// Aspect ratio mode may be changed after open.
    pub change_aspect_ratio: bool,
    /// Deinterlacing may be toggled after open.
    pub change_deinterlacing: bool,
    /// Frames may be decoded at a caller-chosen size.
    pub change_decoding_size: bool,
}

impl Capabilities {
    /// Everything enabled: regular media.
    pub fn full() -> Self {
        Self {
            decode_on_demand: true,
            pre_buffer: true,
            cache: true,
            change_working_zone: true,
            change_aspect_ratio: true,
            change_deinterlacing: true,
            change_decoding_size: true,
        }
    }

    /// Very short media: cached whole, nothing else.
    pub fn cache_only() -> Self {
        Self {
            cache: true,
            ..Self::default()
        }
    }

    /// Summary extraction: synchronous reads only.
    pub fn on_demand_only() -> Self {
        Self {
            decode_on_demand: true,
            ..Self::default()
        }
    }

    /// Whether `mode` may become the active mode.
    pub fn allows(&self, mode: DecodingMode) -> bool {
        match mode {
            DecodingMode::Uninitialized => true,
            DecodingMode::OnDemand => self.decode_on_demand,
            DecodingMode::PreBuffering => self.pre_buffer,
            DecodingMode::Caching => self.cache,
        }
    }
}
