//! FFmpeg library setup and log-level control.
//!
//! FFmpeg keeps its own console logging, separate from the Rust
//! [`log`](https://crates.io/crates/log) facade. The frame server opens and
//! seeks streams constantly, and FFmpeg warns on every imperfect seek, so
//! applications usually want to turn its output down. These functions do
//! that without the caller importing `ffmpeg-next`.
//!
//! # Example
//!
//! ```no_run
//! use frameserver::{FfmpegDecoder, FfmpegLogLevel, ReaderOptions, VideoReader};
//!
//! frameserver::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//!
//! let reader = VideoReader::<FfmpegDecoder>::open("input.mp4", ReaderOptions::new())?;
//! # Ok::<(), frameserver::FrameServerError>(())
//! ```

use std::sync::Once;

use ffmpeg_next::util::log::Level;

use crate::error::FrameServerError;

static INIT: Once = Once::new();

/// FFmpeg internal log verbosity level.
///
/// Maps to FFmpeg's `AV_LOG_*` constants, from `Quiet` (nothing) up to
/// `Trace` (everything).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only conditions that abort the process.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Everything.
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }

    fn from_ffmpeg_level(level: Level) -> Self {
        match level {
            Level::Quiet => FfmpegLogLevel::Quiet,
            Level::Panic => FfmpegLogLevel::Panic,
            Level::Fatal => FfmpegLogLevel::Fatal,
            Level::Error => FfmpegLogLevel::Error,
            Level::Warning => FfmpegLogLevel::Warning,
            Level::Info => FfmpegLogLevel::Info,
            Level::Verbose => FfmpegLogLevel::Verbose,
            Level::Debug => FfmpegLogLevel::Debug,
            Level::Trace => FfmpegLogLevel::Trace,
        }
    }

    /// Parse a level name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "quiet" => Some(FfmpegLogLevel::Quiet),
            "panic" => Some(FfmpegLogLevel::Panic),
            "fatal" => Some(FfmpegLogLevel::Fatal),
            "error" => Some(FfmpegLogLevel::Error),
            "warning" => Some(FfmpegLogLevel::Warning),
            "info" => Some(FfmpegLogLevel::Info),
            "verbose" => Some(FfmpegLogLevel::Verbose),
            "debug" => Some(FfmpegLogLevel::Debug),
            "trace" => Some(FfmpegLogLevel::Trace),
            _ => None,
        }
    }
}

/// Register all FFmpeg formats and codecs. Only the first call does work.
pub(crate) fn initialize() -> Result<(), FrameServerError> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = ffmpeg_next::init().map_err(FrameServerError::from);
    });
    result
}

/// Set the FFmpeg internal log verbosity level.
///
/// This does **not** affect Rust-side `log` output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Get the current FFmpeg internal log verbosity level.
///
/// Returns `None` if the level does not map to a known variant.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(FfmpegLogLevel::from_ffmpeg_level)
}
