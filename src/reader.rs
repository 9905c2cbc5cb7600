//! The decoding-mode controller and public reader surface.
//!
//! [`VideoReader`] owns one decode session and three frame containers, and
//! routes every navigation request to the container of the active
//! [`DecodingMode`]. Requests a container cannot satisfy from memory fall
//! back to a synchronous seek-and-decode through the session; in
//! pre-buffering mode the look-ahead thread is stopped around that decode
//! so the two never interleave stream operations.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::Path,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crate::{
    configuration::{AspectRatioMode, ImportOptions, OutputSettings, ReaderOptions},
    container::{FrameCache, FrameContainer, LookAheadWindow, SingleFrame},
    decoder::Decoder,
    error::FrameServerError,
    ffmpeg_decoder::FfmpegDecoder,
    frame::RawFrame,
    importer::{self, CacheImport},
    lookahead::LookAheadWorker,
    media_info::{Capabilities, DecodingMode, MediaInfo},
    session::{DecodeSession, ReadRequest, SharedSession},
    working_zone::WorkingZone,
};

/// How long [`VideoReader::post_load`] waits for the first look-ahead frame.
const POST_LOAD_WAIT: Duration = Duration::from_millis(100);

/// Outcome of [`VideoReader::update_working_zone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneUpdate {
    /// The working zone after the update. When frames were trimmed from the
    /// cache this is the range of the frames that remain.
    pub realized: WorkingZone,
    /// The section that had to be decoded, empty for a pure reduction.
    pub section_to_cache: WorkingZone,
    /// Whether `section_to_cache` went in front of the cached run.
    pub prepend: bool,
    /// The decoding mode after the update.
    pub mode: DecodingMode,
    /// Frames read by the import, 0 if nothing was imported.
    pub imported: u64,
}

/// Random-access frame server over a sequential [`Decoder`].
///
/// A reader starts in [`DecodingMode::OnDemand`] (or cached whole, for very
/// short media). Call [`post_load`](Self::post_load) to start look-ahead
/// production and [`update_working_zone`](Self::update_working_zone) to
/// cache a range in full when it fits the memory budget.
///
/// # Example
///
/// ```no_run
/// use frameserver::{FfmpegDecoder, FrameServerError, ReaderOptions, VideoReader};
///
/// let mut reader = VideoReader::<FfmpegDecoder>::open("input.mp4", ReaderOptions::new())?;
/// reader.post_load()?;
///
/// while reader.advance(0, true) {
///     if let Some(timestamp) = reader.current_timestamp() {
///         println!("frame at {timestamp}");
///     }
/// }
/// # Ok::<(), FrameServerError>(())
/// ```
pub struct VideoReader<D: Decoder = FfmpegDecoder> {
    session: SharedSession<D>,
    info: MediaInfo,
    options: ReaderOptions,
    capabilities: Capabilities,
    mode: DecodingMode,
    zone: WorkingZone,
    single: SingleFrame,
    window: Arc<LookAheadWindow>,
    cache: FrameCache,
    worker: LookAheadWorker,
    aspect_size: (u32, u32),
    decoding_size: (u32, u32),
    can_draw_unscaled: bool,
    was_prebuffering: bool,
    very_short: bool,
    last_position: Option<i64>,
    initial_import_pending: bool,
}

impl<D: Decoder> Debug for VideoReader<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoReader")
            .field("info", &self.info)
            .field("mode", &self.mode)
            .field("capabilities", &self.capabilities)
            .field("zone", &self.zone)
            .field("decoding_size", &self.decoding_size)
            .field("very_short", &self.very_short)
            .finish_non_exhaustive()
    }
}

impl<D: Decoder> VideoReader<D> {
    /// Open a media file.
    ///
    /// Very short media (at most
    /// [`with_very_short_threshold`](ReaderOptions::with_very_short_threshold)
    /// frames) are cached whole right away and can do nothing else.
    /// Everything else starts in [`DecodingMode::OnDemand`] with every
    /// capability enabled.
    ///
    /// # Errors
    ///
    /// Any open-time error reported by the decoder.
    pub fn open<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self, FrameServerError> {
        Self::load(path.as_ref(), options, false)
    }

    /// Open for thumbnail extraction: synchronous reads only.
    pub(crate) fn open_for_summary(path: &Path) -> Result<Self, FrameServerError> {
        Self::load(path, ReaderOptions::new(), true)
    }

    fn load(path: &Path, options: ReaderOptions, for_summary: bool) -> Result<Self, FrameServerError> {
        let decoder = D::open(path)?;
        let info = decoder.info().clone();
        info.log_summary();

        let aspect_size =
            options
                .aspect_ratio
                .resolve(info.width, info.height, info.pixel_aspect_ratio);
        let output = OutputSettings {
            width: aspect_size.0,
            height: aspect_size.1,
            pixel_format: options.pixel_format,
            quality: options.decode_quality,
            deinterlace: options.deinterlace,
        };
        let session =
            DecodeSession::new(decoder, output, options.seek_retry_margin_seconds).into_shared();

        let very_short = info.is_very_short(options.very_short_threshold_frames);
        let capabilities = if for_summary {
            Capabilities::on_demand_only()
        } else if very_short {
            Capabilities::cache_only()
        } else {
            Capabilities::full()
        };
        let zone = WorkingZone::new(info.first_timestamp, info.last_timestamp());

        let mut reader = Self {
            session,
            info,
            window: Arc::new(LookAheadWindow::new(options.lookahead_capacity)),
            options,
            capabilities,
            mode: DecodingMode::Uninitialized,
            zone,
            single: SingleFrame::new(),
            cache: FrameCache::new(),
            worker: LookAheadWorker::new(),
            aspect_size,
            decoding_size: aspect_size,
            can_draw_unscaled: false,
            was_prebuffering: false,
            very_short,
            last_position: None,
            initial_import_pending: true,
        };

        if very_short && !for_summary {
            log::debug!("Very short media, caching {} whole", reader.zone);
            reader.switch_mode(DecodingMode::Caching)?;
            if let Err(error) = reader.import_to_cache(CacheImport::append(zone), &ImportOptions::new()) {
                log::warn!("Initial import of very short media failed: {error}");
            }
        } else {
            reader.switch_mode(DecodingMode::OnDemand)?;
        }

        Ok(reader)
    }

    /// Stop production and release every frame. The reader is unusable
    /// afterwards; dropping it has the same effect.
    pub fn close(&mut self) {
        if self.mode == DecodingMode::Uninitialized {
            return;
        }
        log::debug!("Closing {}", self.info.path.display());
        self.worker.stop(&self.window);
        self.single.clear();
        self.window.clear();
        self.cache.clear();
        self.mode = DecodingMode::Uninitialized;
        self.zone = WorkingZone::EMPTY;
        self.was_prebuffering = false;
        self.can_draw_unscaled = false;
        self.last_position = None;
    }

    /// Facts about the open media, with the first timestamp corrected once
    /// the first frame has been decoded.
    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    /// The active decoding mode.
    pub fn mode(&self) -> DecodingMode {
        self.mode
    }

    /// What this media allows.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The current working zone.
    pub fn working_zone(&self) -> WorkingZone {
        self.zone
    }

    /// Options the reader was opened with, as since modified.
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Whether the media was small enough to be cached whole at open.
    pub fn is_very_short(&self) -> bool {
        self.very_short
    }

    /// Size frames are currently decoded at.
    pub fn decoding_size(&self) -> (u32, u32) {
        self.decoding_size
    }

    /// Display size of the media under the current aspect ratio mode.
    pub fn aspect_ratio_size(&self) -> (u32, u32) {
        self.aspect_size
    }

    /// Whether frames are decoded at the size they will be displayed at.
    pub fn can_draw_unscaled(&self) -> bool {
        self.can_draw_unscaled
    }

    /// Frames skipped by the consumer while pre-buffering.
    pub fn drops(&self) -> u64 {
        self.window.drops()
    }

    /// Zero the drop counter.
    pub fn reset_drops(&self) {
        if self.mode == DecodingMode::PreBuffering {
            self.window.reset_drops();
        }
    }

    /// Number of frames held by the active container.
    pub fn held_frames(&self) -> usize {
        self.container().map_or(0, |container| container.len())
    }

    /// Timestamps held by the frame cache.
    pub fn cached_timestamps(&self) -> Vec<i64> {
        self.cache.timestamps()
    }

    /// Approximate memory used by the frame cache.
    pub fn cache_memory_bytes(&self) -> usize {
        self.cache.memory_bytes()
    }

    /// Whether the look-ahead thread is running.
    pub fn is_prebuffering(&self) -> bool {
        self.worker.is_running()
    }

    /// Timestamp of the frame under the playhead.
    pub fn current_timestamp(&self) -> Option<i64> {
        self.container()?.current_timestamp()
    }

    /// Call `visit` with the frame under the playhead.
    pub fn with_current_frame<R>(&self, visit: impl FnOnce(&RawFrame) -> R) -> Option<R> {
        match self.mode {
            DecodingMode::OnDemand => self.single.frame().map(visit),
            DecodingMode::PreBuffering => self.window.with_current(visit),
            DecodingMode::Caching => self.cache.current().map(visit),
            DecodingMode::Uninitialized => None,
        }
    }

    /// A copy of the frame under the playhead.
    pub fn current_frame(&self) -> Option<RawFrame> {
        self.with_current_frame(RawFrame::clone)
    }

    /// Make `target` the active mode.
    ///
    /// Leaving pre-buffering stops the look-ahead thread and drops any custom
    /// decoding size. The outgoing container is always cleared. Entering
    /// pre-buffering seeks to the working zone start and starts production;
    /// entering caching only swaps the container, population is
    /// [`update_working_zone`](Self::update_working_zone)'s job.
    ///
    /// # Errors
    ///
    /// [`FrameServerError::CapabilityNotSupported`] if the media does not
    /// allow `target`.
    pub fn switch_mode(&mut self, target: DecodingMode) -> Result<(), FrameServerError> {
        if target == self.mode {
            return Ok(());
        }
        if !self.capabilities.allows(target) {
            return Err(FrameServerError::CapabilityNotSupported("switch decoding mode"));
        }

        log::debug!("Switching decoding mode. {:?} -> {:?}", self.mode, target);

        if let Some(position) = self.current_timestamp() {
            self.last_position = Some(position);
        }

        if self.mode == DecodingMode::PreBuffering {
            self.worker.stop(&self.window);
            self.reset_decoding_size();
        }
        if let Some(container) = self.active_container() {
            container.clear();
        }

        self.mode = target;
        match target {
            DecodingMode::OnDemand => {
                if let Some(position) = self.last_position {
                    self.read_logged(ReadRequest::Seek {
                        target: position,
                        approximate: false,
                    });
                }
            }
            DecodingMode::PreBuffering => {
                let start = self.zone_start();
                self.window.update_working_zone(self.zone);
                self.session.lock().seek(start);
                self.start_prebuffering()?;

                let resume = self
                    .last_position
                    .filter(|&position| position != start && self.zone.contains(position));
                if let Some(position) = resume {
                    self.seek_to(position);
                }
            }
            DecodingMode::Caching | DecodingMode::Uninitialized => {}
        }
        Ok(())
    }

    /// Move forward by `skip + 1` frames.
    ///
    /// In pre-buffering mode, when the window does not hold the target and
    /// `decode_if_necessary` is set, production is stopped, the target is
    /// decoded synchronously and production restarts. Without
    /// `decode_if_necessary` only buffered frames are used.
    ///
    /// Returns whether the playhead moved.
    pub fn advance(&mut self, skip: usize, decode_if_necessary: bool) -> bool {
        let frames = frames_for_skip(skip);
        let moved = match self.mode {
            DecodingMode::Uninitialized => false,
            DecodingMode::OnDemand => self.read_logged(ReadRequest::Next {
                frames: u32::try_from(frames).unwrap_or(u32::MAX),
            }),
            DecodingMode::Caching => self.cache.move_by(frames),
            DecodingMode::PreBuffering => {
                if !decode_if_necessary || self.window.has_next(skip) {
                    self.window.move_by(frames)
                } else {
                    self.advance_synchronously(skip)
                }
            }
        };
        self.apply_first_timestamp();
        moved
    }

    fn advance_synchronously(&mut self, skip: usize) -> bool {
        self.worker.stop(&self.window);

        // Production may have caught up while stopping.
        let moved = if self.window.has_next(skip) {
            self.window.move_by(frames_for_skip(skip))
        } else {
            let missing = skip.saturating_add(1).saturating_sub(self.window.frames_ahead()).max(1);
            if missing > 1 {
                // The frames in between are skipped; keep the run free of holes.
                self.window.clear();
            }

            let result = self.session.lock().read_frame(ReadRequest::Next {
                frames: u32::try_from(missing).unwrap_or(u32::MAX),
            });
            let moved = match result {
                Ok(frame) if self.zone.contains(frame.timestamp) || self.zone.is_empty() => {
                    let timestamp = frame.timestamp;
                    self.window.push_evicting(frame);
                    self.window.move_to(timestamp)
                }
                Ok(frame) => {
                    log::debug!(
                        "Decoded [{}] past the working zone end, rolling over",
                        frame.timestamp
                    );
                    self.roll_over_window()
                }
                Err(FrameServerError::EndOfStream) => self.roll_over_window(),
                Err(error) => {
                    log::debug!("Synchronous read failed: {error}");
                    false
                }
            };
            if moved && skip > 0 {
                self.window.add_drops(skip as u64);
            }
            moved
        };

        if let Err(error) = self.start_prebuffering() {
            log::error!("Failed to restart look-ahead: {error}");
        }
        moved
    }

    fn roll_over_window(&mut self) -> bool {
        let request = ReadRequest::Seek {
            target: self.zone_start(),
            approximate: false,
        };
        let result = self.session.lock().read_frame(request);
        match result {
            Ok(frame) => {
                let timestamp = frame.timestamp;
                self.window.push_evicting(frame);
                self.window.move_to(timestamp)
            }
            Err(error) => {
                log::debug!("Rollover read failed: {error}");
                false
            }
        }
    }

    /// Move to the frame showing at `timestamp`.
    ///
    /// Returns whether the playhead moved.
    pub fn seek_to(&mut self, timestamp: i64) -> bool {
        let moved = match self.mode {
            DecodingMode::Uninitialized => false,
            DecodingMode::OnDemand => self.read_logged(ReadRequest::Seek {
                target: timestamp,
                approximate: false,
            }),
            DecodingMode::Caching => self.cache.move_to(timestamp),
            DecodingMode::PreBuffering => {
                if self.window.contains(timestamp) {
                    self.window.move_to(timestamp)
                } else {
                    self.seek_synchronously(timestamp)
                }
            }
        };
        self.apply_first_timestamp();
        moved
    }

    fn seek_synchronously(&mut self, timestamp: i64) -> bool {
        self.worker.stop(&self.window);

        // Only a jump to the next frame or a wrap to the zone start keeps
        // the window contiguous.
        if !self.window.is_rollover_jump(timestamp) {
            log::debug!(
                "Out of segment jump, clearing look-ahead. Asked [{timestamp}] in {}",
                self.window.working_zone()
            );
            self.window.clear();
        }

        let request = ReadRequest::Seek {
            target: timestamp,
            approximate: false,
        };
        let result = self.session.lock().read_frame(request);
        let moved = match result {
            Ok(frame) => {
                // Landing may differ from the request.
                let actual = frame.timestamp;
                self.window.push_evicting(frame);
                self.window.move_to(actual)
            }
            Err(error) => {
                log::debug!("Seek to [{timestamp}] failed: {error}");
                false
            }
        };

        if let Err(error) = self.start_prebuffering() {
            log::error!("Failed to restart look-ahead: {error}");
        }
        moved
    }

    /// Move back one frame.
    pub fn move_previous(&mut self) -> bool {
        if self.mode == DecodingMode::Caching {
            return self.cache.move_by(-1);
        }
        if self.mode == DecodingMode::PreBuffering && self.window.move_by(-1) {
            return true;
        }

        match self.current_timestamp() {
            Some(current) if current > self.info.first_timestamp => {
                let target = (current - self.info.timestamps_per_frame).max(self.info.first_timestamp);
                self.seek_to(target)
            }
            _ => false,
        }
    }

    /// Move to the first frame of the working zone.
    pub fn move_first(&mut self) -> bool {
        match self.mode {
            DecodingMode::Caching => self.cache.move_first(),
            DecodingMode::Uninitialized => false,
            _ => {
                let start = self.zone_start();
                self.seek_to(start)
            }
        }
    }

    /// Move to the last frame of the working zone.
    pub fn move_last(&mut self) -> bool {
        match self.mode {
            DecodingMode::Caching => self.cache.move_last(),
            DecodingMode::Uninitialized => false,
            _ if self.zone.is_empty() => false,
            _ => {
                let end = self.zone.end;
                self.seek_to(end)
            }
        }
    }

    /// Retarget the working zone.
    ///
    /// Without cache support the look-ahead window is simply retargeted.
    /// Otherwise the zone is cached in full if it fits the memory budget:
    /// frames outside the new zone are evicted, then only the missing
    /// section is decoded, in front of or after the cached run. A zone that
    /// does not fit, or an import that fails or is cancelled through
    /// `options`, falls back to pre-buffering, else to on-demand decoding.
    ///
    /// # Errors
    ///
    /// [`FrameServerError::NotLoaded`] after [`close`](Self::close),
    /// [`FrameServerError::CapabilityNotSupported`] if the media does not
    /// allow zone changes or no mode is left after a failed import.
    pub fn update_working_zone(
        &mut self,
        zone: WorkingZone,
        force_reload: bool,
        options: &ImportOptions,
    ) -> Result<ZoneUpdate, FrameServerError> {
        if self.mode == DecodingMode::Uninitialized {
            return Err(FrameServerError::NotLoaded);
        }
        if !self.capabilities.change_working_zone {
            return Err(FrameServerError::CapabilityNotSupported("change working zone"));
        }

        log::debug!(
            "Update working zone request. {} to {zone}. Force reload: {force_reload}",
            self.zone
        );

        if !force_reload && self.zone == zone {
            return Ok(self.zone_update(WorkingZone::EMPTY, false, 0));
        }

        if !self.capabilities.cache {
            self.zone = zone;
            if self.mode == DecodingMode::OnDemand && self.capabilities.pre_buffer {
                self.switch_mode(DecodingMode::PreBuffering)?;
            } else if self.mode == DecodingMode::PreBuffering {
                self.window.update_working_zone(zone);
            }
            return Ok(self.zone_update(WorkingZone::EMPTY, false, 0));
        }

        if !self.working_zone_fits_in_memory(zone) {
            log::debug!("New working zone {zone} does not fit in memory");
            self.zone = zone;
            self.switch_to_best_after_caching()?;
            return Ok(self.zone_update(WorkingZone::EMPTY, false, 0));
        }

        let task = if self.mode != DecodingMode::Caching || force_reload {
            log::debug!("Entering caching mode, importing the whole zone");
            if self.mode == DecodingMode::Caching {
                self.cache.clear();
            }
            self.switch_mode(DecodingMode::Caching)?;
            self.zone = zone;
            CacheImport::append(zone)
        } else {
            self.plan_cache_delta(zone)
        };

        if task.section.is_empty() {
            return Ok(self.zone_update(task.section, task.prepend, 0));
        }

        log::debug!("New frames to cache needed: {}", task.section);
        let imported = match self.import_to_cache(task, options) {
            Ok(read) => read,
            Err(error @ FrameServerError::CapabilityNotSupported(_)) => return Err(error),
            Err(error) => {
                log::debug!("Cache import aborted ({error}), now {:?}", self.mode);
                0
            }
        };
        Ok(self.zone_update(task.section, task.prepend, imported))
    }

    /// Trim the cache to `zone`, then work out what is left to decode.
    fn plan_cache_delta(&mut self, zone: WorkingZone) -> CacheImport {
        let trimmed_start = zone.start > self.zone.start;
        if trimmed_start {
            self.cache
                .reduce_working_zone(WorkingZone::new(zone.start, self.zone.end));
            self.zone = self.cache.working_zone();
        }

        let trimmed_end = zone.end < self.zone.end;
        if trimmed_end {
            self.cache
                .reduce_working_zone(WorkingZone::new(self.zone.start, zone.end));
            self.zone = self.cache.working_zone();
        }

        let grows_start = !trimmed_start && zone.start < self.zone.start;
        let grows_end = !trimmed_end && zone.end > self.zone.end;

        if self.zone.is_empty() || (grows_start && grows_end) {
            // Extending both ends, or nothing left to extend from.
            self.cache.clear();
            self.zone = zone;
            CacheImport::append(zone)
        } else if grows_start {
            CacheImport::prepend(WorkingZone::new(zone.start, self.zone.start))
        } else if grows_end {
            CacheImport::append(WorkingZone::new(self.zone.end, zone.end))
        } else {
            CacheImport::append(WorkingZone::EMPTY)
        }
    }

    /// Decode `task` into the frame cache.
    ///
    /// On failure or cancellation the cache is left empty and the reader
    /// falls back to the best remaining mode before the error is returned.
    ///
    /// # Errors
    ///
    /// [`FrameServerError::CapabilityNotSupported`] outside caching mode or
    /// when no fallback mode is available, otherwise the import error.
    pub fn import_to_cache(
        &mut self,
        task: CacheImport,
        options: &ImportOptions,
    ) -> Result<u64, FrameServerError> {
        if self.mode != DecodingMode::Caching {
            return Err(FrameServerError::CapabilityNotSupported(
                "cache import outside caching mode",
            ));
        }

        // Only the open-time import of very short media starts where the
        // decoder already is. Anything else may have moved it.
        let first_import = std::mem::take(&mut self.initial_import_pending);
        let skip_initial_seek =
            self.very_short && first_import && task.section.start <= self.info.first_timestamp;
        let result = {
            let mut session = self.session.lock();
            importer::import_range(&mut session, &mut self.cache, task, skip_initial_seek, options)
        };
        self.apply_first_timestamp();

        match result {
            Ok(read) => {
                let total = task.section.frame_count(self.info.timestamps_per_frame);
                if read + 1 >= total && !self.cache.is_empty() {
                    self.zone = self.cache.working_zone();
                }
                Ok(read)
            }
            Err(error) => {
                self.cache.clear();
                self.switch_to_best_after_caching()?;
                Err(error)
            }
        }
    }

    /// Whether `zone` may be cached whole under the configured time and
    /// memory budget. Sized at the aspect-ratio size, not the decoding size.
    pub fn working_zone_fits_in_memory(&self, zone: WorkingZone) -> bool {
        if self.info.timestamps_per_second <= 0.0 {
            return false;
        }
        let seconds = zone.duration() as f64 / self.info.timestamps_per_second;
        let frame_bytes = self.aspect_size.0 as f64
            * self.aspect_size.1 as f64
            * self.options.pixel_format.bytes_per_pixel() as f64;
        let megabytes = seconds * self.info.frames_per_second * frame_bytes / 1_048_576.0;

        seconds > 0.0
            && seconds <= self.options.max_working_zone_seconds as f64
            && megabytes <= self.options.max_working_zone_memory_mb as f64
    }

    fn switch_to_best_after_caching(&mut self) -> Result<(), FrameServerError> {
        self.window.update_working_zone(self.zone);
        if self.capabilities.pre_buffer {
            self.switch_mode(DecodingMode::PreBuffering)
        } else if self.capabilities.decode_on_demand {
            self.switch_mode(DecodingMode::OnDemand)
        } else {
            Err(FrameServerError::CapabilityNotSupported(
                "no decoding mode available after caching",
            ))
        }
    }

    /// Decode at a custom size while pre-buffering.
    ///
    /// Outside pre-buffering nothing changes and frames keep coming at the
    /// aspect-ratio size.
    ///
    /// # Errors
    ///
    /// [`FrameServerError::CapabilityNotSupported`] if the media does not
    /// allow it.
    pub fn change_decoding_size(&mut self, width: u32, height: u32) -> Result<(), FrameServerError> {
        if !self.capabilities.change_decoding_size {
            return Err(FrameServerError::CapabilityNotSupported("change decoding size"));
        }

        if self.mode != DecodingMode::PreBuffering {
            log::debug!("Will not change decoding size because we are not prebuffering");
            self.can_draw_unscaled = false;
            return Ok(());
        }

        let target = (width.max(1), height.max(1));
        if target == self.decoding_size {
            log::debug!("Already decoding at the right size");
            self.can_draw_unscaled = true;
            return Ok(());
        }

        log::debug!(
            "Changing decoding size from {:?} to {target:?}",
            self.decoding_size
        );
        self.decoding_size = target;
        self.can_draw_unscaled = true;
        self.reload_output()
    }

    /// Go back to decoding at the aspect-ratio size.
    pub fn disable_custom_decoding_size(&mut self) -> Result<(), FrameServerError> {
        self.can_draw_unscaled = false;
        if self.mode != DecodingMode::PreBuffering {
            return Ok(());
        }
        self.decoding_size = self.aspect_size;
        self.reload_output()
    }

    fn reset_decoding_size(&mut self) {
        self.decoding_size = self.aspect_size;
        self.can_draw_unscaled = false;
        self.session.lock().set_output(self.output_settings());
    }

    /// Change the aspect ratio mode. Held frames are discarded.
    ///
    /// # Errors
    ///
    /// [`FrameServerError::CapabilityNotSupported`] if the media does not
    /// allow it.
    pub fn change_aspect_ratio(&mut self, mode: AspectRatioMode) -> Result<(), FrameServerError> {
        if !self.capabilities.change_aspect_ratio {
            return Err(FrameServerError::CapabilityNotSupported("change aspect ratio"));
        }

        self.options.aspect_ratio = mode;
        self.aspect_size = mode.resolve(self.info.width, self.info.height, self.info.pixel_aspect_ratio);
        self.decoding_size = self.aspect_size;
        log::debug!("Aspect ratio set to {mode:?}, size {:?}", self.aspect_size);
        self.reload_output()
    }

    /// Toggle deinterlacing. Held frames are discarded.
    ///
    /// # Errors
    ///
    /// [`FrameServerError::CapabilityNotSupported`] if the media does not
    /// allow it.
    pub fn change_deinterlace(&mut self, deinterlace: bool) -> Result<(), FrameServerError> {
        if !self.capabilities.change_deinterlacing {
            return Err(FrameServerError::CapabilityNotSupported("change deinterlacing"));
        }

        self.options.deinterlace = deinterlace;
        self.reload_output()
    }

    /// Push new output settings to the session and drop frames decoded
    /// under the old ones. While pre-buffering, the current frame is decoded
    /// again and production restarts behind it.
    fn reload_output(&mut self) -> Result<(), FrameServerError> {
        let position = self.current_timestamp();
        let prebuffering = self.mode == DecodingMode::PreBuffering;

        if prebuffering {
            self.worker.stop(&self.window);
        }
        self.session.lock().set_output(self.output_settings());
        if let Some(container) = self.active_container() {
            container.clear();
        }

        if prebuffering {
            if let Some(position) = position {
                let request = ReadRequest::Seek {
                    target: position,
                    approximate: false,
                };
                if let Ok(timestamp) = self.read_into_container(request) {
                    self.window.move_to(timestamp);
                }
            }
            self.start_prebuffering()?;
        }
        Ok(())
    }

    /// Suspend look-ahead while every frame is enumerated in order.
    pub fn before_enumeration(&mut self) -> Result<(), FrameServerError> {
        if self.mode == DecodingMode::PreBuffering {
            self.was_prebuffering = true;
            self.switch_mode(DecodingMode::OnDemand)?;
        }
        Ok(())
    }

    /// Resume look-ahead suspended by [`before_enumeration`](Self::before_enumeration).
    pub fn after_enumeration(&mut self) -> Result<(), FrameServerError> {
        if std::mem::take(&mut self.was_prebuffering) {
            self.switch_mode(DecodingMode::PreBuffering)?;
        }
        Ok(())
    }

    /// Start look-ahead production on a freshly opened media and give the
    /// thread a moment to decode the first frame.
    pub fn post_load(&mut self) -> Result<(), FrameServerError> {
        if !self.capabilities.pre_buffer || self.mode != DecodingMode::OnDemand {
            return Ok(());
        }

        self.switch_mode(DecodingMode::PreBuffering)?;

        let deadline = Instant::now() + POST_LOAD_WAIT;
        while self.window.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    /// Make sure look-ahead production runs before playback starts.
    pub fn before_playloop(&mut self) -> Result<(), FrameServerError> {
        let should_prebuffer = self.mode != DecodingMode::Caching
            && self.capabilities.pre_buffer
            && self.mode != DecodingMode::PreBuffering;
        if should_prebuffer {
            log::error!("Forcing look-ahead thread to restart");
            self.switch_mode(DecodingMode::PreBuffering)?;
        }
        Ok(())
    }

    fn start_prebuffering(&mut self) -> Result<(), FrameServerError> {
        if !self.capabilities.pre_buffer {
            return Err(FrameServerError::CapabilityNotSupported("pre-buffering"));
        }
        if self.mode != DecodingMode::PreBuffering {
            return Ok(());
        }

        if self.worker.is_running() {
            log::error!("Look-ahead thread already started");
            self.worker.stop(&self.window);
            self.window.clear();
        }

        log::debug!("Starting look-ahead thread");
        self.worker.start(
            Arc::clone(&self.session),
            Arc::clone(&self.window),
            self.info.frame_interval_ms(),
        )
    }

    /// Decode at a reduced size, without any capability check.
    pub(crate) fn force_decoding_size(&mut self, width: u32, height: u32) {
        self.decoding_size = (width.max(1), height.max(1));
        self.session.lock().set_output(self.output_settings());
    }

    /// Read one frame into the active container.
    pub(crate) fn read_into_container(
        &mut self,
        request: ReadRequest,
    ) -> Result<i64, FrameServerError> {
        let frame = self.session.lock().read_frame(request)?;
        let timestamp = frame.timestamp;
        if let Some(container) = self.active_container() {
            container.add(frame);
        }
        self.apply_first_timestamp();
        Ok(timestamp)
    }

    fn read_logged(&mut self, request: ReadRequest) -> bool {
        match self.read_into_container(request) {
            Ok(_) => true,
            Err(error) => {
                log::debug!("Read {request:?} failed: {error}");
                false
            }
        }
    }

    /// Adopt the first decoded timestamp as the start of the media.
    fn apply_first_timestamp(&mut self) {
        let Some(first) = self.session.lock().take_first_timestamp() else {
            return;
        };
        if first == self.info.first_timestamp {
            return;
        }

        log::debug!(
            "First frame decoded at [{first}], expected [{}]",
            self.info.first_timestamp
        );
        self.info.first_timestamp = first;
        if !self.zone.is_empty() && first <= self.zone.end {
            self.zone = WorkingZone::new(first, self.zone.end);
            self.window.update_working_zone(self.zone);
        }
    }

    fn zone_start(&self) -> i64 {
        if self.zone.is_empty() {
            self.info.first_timestamp
        } else {
            self.zone.start
        }
    }

    fn output_settings(&self) -> OutputSettings {
        OutputSettings {
            width: self.decoding_size.0,
            height: self.decoding_size.1,
            pixel_format: self.options.pixel_format,
            quality: self.options.decode_quality,
            deinterlace: self.options.deinterlace,
        }
    }

    fn zone_update(&self, section: WorkingZone, prepend: bool, imported: u64) -> ZoneUpdate {
        ZoneUpdate {
            realized: self.zone,
            section_to_cache: section,
            prepend,
            mode: self.mode,
            imported,
        }
    }

    fn container(&self) -> Option<&dyn FrameContainer> {
        match self.mode {
            DecodingMode::OnDemand => Some(&self.single),
            DecodingMode::PreBuffering => Some(&self.window),
            DecodingMode::Caching => Some(&self.cache),
            DecodingMode::Uninitialized => None,
        }
    }

    fn active_container(&mut self) -> Option<&mut dyn FrameContainer> {
        match self.mode {
            DecodingMode::OnDemand => Some(&mut self.single),
            DecodingMode::PreBuffering => Some(&mut self.window),
            DecodingMode::Caching => Some(&mut self.cache),
            DecodingMode::Uninitialized => None,
        }
    }
}

impl<D: Decoder> Drop for VideoReader<D> {
    fn drop(&mut self) {
        self.worker.stop(&self.window);
    }
}

/// Frames to move for an advance that skips `skip` frames.
fn frames_for_skip(skip: usize) -> i64 {
    i64::try_from(skip).map_or(i64::MAX, |skip| skip.saturating_add(1))
}
