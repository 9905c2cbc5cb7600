//! # frameserver
//!
//! Random-access frame serving over a sequential, seek-expensive video
//! decoder.
//!
//! Video decoders read forward one packet at a time and seek only to
//! keyframes. Players want the opposite: step forward and backward, jump
//! anywhere, loop a section. `frameserver` sits between the two and keeps
//! frames readily available with bounded memory, in one of three modes:
//!
//! - **On demand**: every request is a synchronous seek-and-decode.
//! - **Pre-buffering**: a background thread keeps a bounded window of
//!   upcoming frames, looping over the working zone.
//! - **Caching**: every frame of the working zone is held in memory, and
//!   zone changes only decode the missing part.
//!
//! Decoders may buffer and reorder frames internally, so the timestamp
//! attached to a packet is not necessarily the one of the picture it
//! completes. [`TimestampReconciler`] recovers the real one.
//!
//! ## Quick Start
//!
//! ### Play a file
//!
//! ```no_run
//! use frameserver::{FfmpegDecoder, ReaderOptions, VideoReader};
//!
//! let mut reader = VideoReader::<FfmpegDecoder>::open("input.mp4", ReaderOptions::new())?;
//! reader.post_load()?;
//! reader.before_playloop()?;
//!
//! for _ in 0..100 {
//!     reader.advance(0, true);
//! }
//! println!("{} frames dropped", reader.drops());
//! # Ok::<(), frameserver::FrameServerError>(())
//! ```
//!
//! ### Cache a section
//!
//! ```no_run
//! use frameserver::{FfmpegDecoder, ImportOptions, ReaderOptions, VideoReader, WorkingZone};
//!
//! let mut reader = VideoReader::<FfmpegDecoder>::open("input.mp4", ReaderOptions::new())?;
//! let tps = reader.info().timestamps_per_second as i64;
//! let update = reader.update_working_zone(
//!     WorkingZone::new(0, 2 * tps),
//!     false,
//!     &ImportOptions::new(),
//! )?;
//! println!("now {:?}, holding {}", update.mode, update.realized);
//!
//! // Navigation inside the cached zone never decodes.
//! reader.seek_to(tps);
//! # Ok::<(), frameserver::FrameServerError>(())
//! ```
//!
//! ### Thumbnails
//!
//! ```no_run
//! use frameserver::{FfmpegDecoder, VideoReader};
//!
//! let summary = VideoReader::<FfmpegDecoder>::extract_summary("input.mp4", 6, 160)?;
//! println!("{:?}, {} thumbnails", summary.duration, summary.thumbnails.len());
//! # Ok::<(), frameserver::FrameServerError>(())
//! ```
//!
//! ## Custom decoders
//!
//! [`VideoReader`] is generic over [`Decoder`]. [`FfmpegDecoder`] is the
//! default; anything that can read packets, seek and convert pictures can
//! take its place.

pub mod configuration;
pub mod container;
mod conversion;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod ffmpeg_decoder;
pub mod frame;
mod importer;
mod lookahead;
pub mod media_info;
pub mod progress;
pub mod reader;
mod session;
pub mod summary;
pub mod timestamp;
pub mod working_zone;

pub use configuration::{
    AspectRatioMode, DecodeQuality, ImportOptions, OutputSettings, PixelFormat, ReaderOptions,
};
pub use container::{FrameCache, FrameContainer, LookAheadWindow, SingleFrame};
pub use decoder::{DecodeEvent, Decoder};
pub use error::FrameServerError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use ffmpeg_decoder::FfmpegDecoder;
pub use frame::{Picture, RawFrame};
pub use importer::CacheImport;
pub use media_info::{
    Capabilities, DecodingMode, FrameRateHints, FrameRateSource, MediaInfo,
    estimate_frames_per_second, pixel_aspect_ratio,
};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use reader::{VideoReader, ZoneUpdate};
pub use summary::VideoSummary;
pub use timestamp::{TimestampReconciler, TimestampState};
pub use working_zone::WorkingZone;
