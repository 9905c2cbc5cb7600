//! A deterministic in-memory decoder for driving the reader without media
//! files.
//!
//! Each test registers a [`SyntheticConfig`] under a unique path and opens
//! that path through `VideoReader::<SyntheticDecoder>::open`. The decoder
//! produces `frames` pictures at `first_timestamp + index * timestamps_per_frame`,
//! each filled with a byte derived from its index.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use frameserver::{
    DecodeEvent, Decoder, FrameRateSource, FrameServerError, MediaInfo, OutputSettings, Picture,
};

/// Shape of a synthetic stream.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub frames: usize,
    pub timestamps_per_frame: i64,
    pub timestamps_per_second: f64,
    /// Timestamp of the first real frame.
    pub first_timestamp: i64,
    /// First timestamp the container claims at open time.
    pub declared_first_timestamp: i64,
    pub width: u32,
    pub height: u32,
    /// Keyframe interval in frames; seeks land on a multiple of it.
    pub gop: usize,
    /// Hold every picture back by one packet, like a B-frame decoder.
    pub reorder: bool,
    /// Packets carry a decode timestamp only.
    pub missing_pts: bool,
    /// Number of seeks that land `overshoot_frames` past the keyframe.
    pub bad_seeks: usize,
    pub overshoot_frames: usize,
    /// Packet index whose read fails once.
    pub fail_at: Option<usize>,
    /// Time spent decoding each packet.
    pub packet_delay: Option<Duration>,
    /// Frame index whose converted picture comes out short.
    pub truncated_picture_at: Option<usize>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frames: 100,
            timestamps_per_frame: 10,
            timestamps_per_second: 1000.0,
            first_timestamp: 0,
            declared_first_timestamp: 0,
            width: 8,
            height: 4,
            gop: 10,
            reorder: false,
            missing_pts: false,
            bad_seeks: 0,
            overshoot_frames: 0,
            fail_at: None,
            packet_delay: None,
            truncated_picture_at: None,
        }
    }
}

impl SyntheticConfig {
    pub fn with_frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_first_timestamp(mut self, declared: i64, actual: i64) -> Self {
        self.declared_first_timestamp = declared;
        self.first_timestamp = actual;
        self
    }

    pub fn with_reorder(mut self) -> Self {
        self.reorder = true;
        self
    }

    pub fn with_missing_pts(mut self) -> Self {
        self.missing_pts = true;
        self
    }

    pub fn with_overshooting_seeks(mut self, seeks: usize, frames: usize) -> Self {
        self.bad_seeks = seeks;
        self.overshoot_frames = frames;
        self
    }

    pub fn with_failure_at(mut self, packet: usize) -> Self {
        self.fail_at = Some(packet);
        self
    }

    pub fn with_packet_delay(mut self, delay: Duration) -> Self {
        self.packet_delay = Some(delay);
        self
    }

    pub fn with_truncated_picture_at(mut self, index: usize) -> Self {
        self.truncated_picture_at = Some(index);
        self
    }

    /// Timestamp of the frame at `index`.
    pub fn timestamp(&self, index: usize) -> i64 {
        self.first_timestamp + index as i64 * self.timestamps_per_frame
    }

    /// Timestamp of the last frame.
    pub fn last_timestamp(&self) -> i64 {
        self.timestamp(self.frames.saturating_sub(1))
    }
}

/// Counters shared between a test and the decoder it registered.
#[derive(Debug, Default)]
pub struct DecoderStats {
    pub packets: AtomicUsize,
    pub seeks: AtomicUsize,
    pub conversions: AtomicUsize,
}

impl DecoderStats {
    pub fn packets(&self) -> usize {
        self.packets.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    pub fn conversions(&self) -> usize {
        self.conversions.load(Ordering::SeqCst)
    }
}

type Registry = Mutex<HashMap<PathBuf, (SyntheticConfig, Arc<DecoderStats>)>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Make `config` openable at a path derived from `name`.
pub fn register(name: &str, config: SyntheticConfig) -> (PathBuf, Arc<DecoderStats>) {
    let path = PathBuf::from(format!("synthetic://{name}"));
    let stats = Arc::new(DecoderStats::default());
    registry()
        .lock()
        .expect("registry poisoned")
        .insert(path.clone(), (config, Arc::clone(&stats)));
    (path, stats)
}

/// Byte every picture of frame `index` is filled with.
pub fn fill_byte(index: usize) -> u8 {
    (index % 251) as u8
}

pub struct SyntheticDecoder {
    config: SyntheticConfig,
    stats: Arc<DecoderStats>,
    info: MediaInfo,
    position: usize,
    pending: Option<usize>,
    decoded: Option<usize>,
    bad_seeks: usize,
    fail_at: Option<usize>,
}

impl SyntheticDecoder {
    fn hints(&self, index: usize) -> (Option<i64>, Option<i64>) {
        let timestamp = self.config.timestamp(index);
        if self.config.missing_pts {
            (Some(timestamp), None)
        } else {
            (Some(timestamp), Some(timestamp))
        }
    }
}

impl Decoder for SyntheticDecoder {
    fn open(path: &Path) -> Result<Self, FrameServerError> {
        let entry = registry()
            .lock()
            .expect("registry poisoned")
            .get(path)
            .cloned();
        let Some((config, stats)) = entry else {
            return Err(FrameServerError::FileOpen {
                path: path.to_path_buf(),
                reason: "not registered".to_string(),
            });
        };

        let info = MediaInfo {
            path: path.to_path_buf(),
            format: "synthetic".to_string(),
            codec: "raw".to_string(),
            width: config.width,
            height: config.height,
            pixel_aspect_ratio: 1.0,
            frames_per_second: config.timestamps_per_second / config.timestamps_per_frame as f64,
            frame_rate_source: FrameRateSource::Average,
            timestamps_per_second: config.timestamps_per_second,
            timestamps_per_frame: config.timestamps_per_frame,
            duration: config.frames as i64 * config.timestamps_per_frame,
            first_timestamp: config.declared_first_timestamp,
        };

        Ok(Self {
            bad_seeks: config.bad_seeks,
            fail_at: config.fail_at,
            config,
            stats,
            info,
            position: 0,
            pending: None,
            decoded: None,
        })
    }

    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn read_next(&mut self) -> Result<DecodeEvent, FrameServerError> {
        if self.position >= self.config.frames {
            return match self.pending.take() {
                Some(index) if self.config.reorder => {
                    self.decoded = Some(index);
                    Ok(DecodeEvent::Decoded {
                        dts: None,
                        pts: None,
                    })
                }
                _ => Ok(DecodeEvent::EndOfStream),
            };
        }

        let index = self.position;
        self.position += 1;
        self.stats.packets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.config.packet_delay {
            std::thread::sleep(delay);
        }

        if self.fail_at == Some(index) {
            self.fail_at = None;
            return Err(FrameServerError::FrameNotRead(format!(
                "corrupt packet {index}"
            )));
        }

        let (dts, pts) = self.hints(index);
        if !self.config.reorder {
            self.decoded = Some(index);
            return Ok(DecodeEvent::Decoded { dts, pts });
        }

        match self.pending.replace(index) {
            None => Ok(DecodeEvent::Buffered { dts, pts }),
            Some(previous) => {
                self.decoded = Some(previous);
                Ok(DecodeEvent::Decoded { dts, pts })
            }
        }
    }

    fn seek(&mut self, target: i64) -> Result<(), FrameServerError> {
        self.stats.seeks.fetch_add(1, Ordering::SeqCst);

        let offset = (target - self.config.first_timestamp).max(0);
        let index = (offset / self.config.timestamps_per_frame) as usize;
        let index = index.min(self.config.frames.saturating_sub(1));
        let mut keyframe = index / self.config.gop.max(1) * self.config.gop.max(1);

        if self.bad_seeks > 0 {
            self.bad_seeks -= 1;
            keyframe = (keyframe + self.config.overshoot_frames)
                .min(self.config.frames.saturating_sub(1));
        }

        self.position = keyframe;
        self.pending = None;
        self.decoded = None;
        Ok(())
    }

    fn convert(&mut self, settings: &OutputSettings) -> Result<Picture, FrameServerError> {
        let index = self.decoded.ok_or_else(|| {
            FrameServerError::ImageNotConverted("nothing decoded".to_string())
        })?;
        self.stats.conversions.fetch_add(1, Ordering::SeqCst);

        let mut picture = Picture::blank(settings.width, settings.height, settings.pixel_format);
        picture.data.fill(fill_byte(index));
        if self.config.truncated_picture_at == Some(index) {
            picture.data.truncate(picture.data.len() / 2);
        }
        Ok(picture)
    }
}

/// Poll `condition` every millisecond until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
