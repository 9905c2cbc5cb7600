//! Quick media summaries for file browsers.
//!
//! A summary opens the media with synchronous reads only, samples a few
//! evenly spaced frames at a reduced size, and closes it again.

use std::{path::Path, path::PathBuf, time::Duration};

use image::DynamicImage;

use crate::{
    configuration::ImportOptions,
    decoder::Decoder,
    error::FrameServerError,
    progress::{OperationType, ProgressTracker},
    reader::VideoReader,
    session::ReadRequest,
};

/// Basic facts and a strip of thumbnails.
#[derive(Debug, Clone)]
pub struct VideoSummary {
    /// The summarised file.
    pub path: PathBuf,
    /// Whether the media is a single still image.
    pub is_image: bool,
    /// Time from the first to the last frame.
    pub duration: Duration,
    /// Coded picture size.
    pub image_size: (u32, u32),
    /// Average frame rate.
    pub frames_per_second: f64,
    /// Evenly spaced thumbnails, in presentation order.
    pub thumbnails: Vec<DynamicImage>,
}

impl<D: Decoder> VideoReader<D> {
    /// Summarise the media at `path` with up to `thumbs` thumbnails at most
    /// `max_width` pixels wide.
    ///
    /// # Errors
    ///
    /// Any open-time error. Failures while sampling only shorten the
    /// thumbnail strip.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use frameserver::{FfmpegDecoder, FrameServerError, VideoReader};
    ///
    /// let summary = VideoReader::<FfmpegDecoder>::extract_summary("input.mp4", 5, 160)?;
    /// for (index, thumbnail) in summary.thumbnails.iter().enumerate() {
    ///     thumbnail.save(format!("thumb_{index}.png"))?;
    /// }
    /// # Ok::<(), FrameServerError>(())
    /// ```
    pub fn extract_summary<P: AsRef<Path>>(
        path: P,
        thumbs: u32,
        max_width: u32,
    ) -> Result<VideoSummary, FrameServerError> {
        Self::extract_summary_with_options(path, thumbs, max_width, &ImportOptions::new())
    }

    /// Like [`extract_summary`](Self::extract_summary), reporting progress
    /// per thumbnail and stopping early on cancellation.
    pub fn extract_summary_with_options<P: AsRef<Path>>(
        path: P,
        thumbs: u32,
        max_width: u32,
        options: &ImportOptions,
    ) -> Result<VideoSummary, FrameServerError> {
        let path = path.as_ref();
        let mut reader = Self::open_for_summary(path)?;
        let info = reader.info().clone();

        let duration_seconds = if info.timestamps_per_second > 0.0 {
            ((info.duration - info.timestamps_per_frame) as f64 / info.timestamps_per_second).max(0.0)
        } else {
            0.0
        };

        let mut summary = VideoSummary {
            path: path.to_path_buf(),
            is_image: info.duration == 1,
            duration: Duration::from_secs_f64(duration_seconds),
            image_size: (info.width, info.height),
            frames_per_second: info.frames_per_second,
            thumbnails: Vec::with_capacity(thumbs as usize),
        };

        if thumbs == 0 || max_width == 0 || info.width == 0 {
            reader.close();
            return Ok(summary);
        }

        let stretch = info.width as f64 / max_width as f64;
        reader.force_decoding_size(max_width, (info.height as f64 / stretch) as u32);

        let step = (info.duration as f64 / thumbs as f64).ceil().max(1.0) as i64;
        let mut tracker = ProgressTracker::new(
            options.progress.clone(),
            OperationType::Summary,
            Some(thumbs as u64),
            options.batch_size,
        );
        let mut previous: Option<i64> = None;
        let mut offset = 0;

        while offset < info.duration && !options.is_cancelled() {
            let request = if offset == 0 {
                ReadRequest::Next { frames: 1 }
            } else {
                ReadRequest::Seek {
                    target: info.first_timestamp + offset,
                    approximate: true,
                }
            };

            let timestamp = match reader.read_into_container(request) {
                Ok(timestamp) if previous.is_none_or(|previous| timestamp > previous) => timestamp,
                Ok(_) => break,
                Err(error) => {
                    log::debug!("Summary stopped at offset {offset}: {error}");
                    break;
                }
            };

            let Some(thumbnail) = reader.with_current_frame(|frame| frame.picture.to_image()) else {
                break;
            };
            previous = Some(timestamp);
            offset += step;
            tracker.advance(Some(timestamp));

            match thumbnail {
                Ok(thumbnail) => summary.thumbnails.push(thumbnail),
                Err(error) => log::warn!("Summary thumbnail at [{timestamp}] skipped: {error}"),
            }
        }

        tracker.finish();
        reader.close();
        Ok(summary)
    }
}
