//! Bulk import of a working-zone section into the [`FrameCache`].

use crate::{
    configuration::ImportOptions,
    container::{FrameCache, FrameContainer},
    decoder::Decoder,
    error::FrameServerError,
    progress::{OperationType, ProgressTracker},
    session::{DecodeSession, ReadRequest},
    working_zone::WorkingZone,
};

/// A section of the working zone to decode into the cache.
///
/// `prepend` inserts the section in front of the frames already cached;
/// otherwise it is appended after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheImport {
    /// Timestamps to decode, bounds included.
    pub section: WorkingZone,
    /// Insert in front of the existing run.
    pub prepend: bool,
}

impl CacheImport {
    /// An import of `section` that appends after the cached run.
    pub fn append(section: WorkingZone) -> Self {
        Self {
            section,
            prepend: false,
        }
    }

    /// An import of `section` that goes in front of the cached run.
    pub fn prepend(section: WorkingZone) -> Self {
        Self {
            section,
            prepend: true,
        }
    }
}

/// Decode every frame of `task.section` into `cache`.
///
/// Returns the number of frames read. With `skip_initial_seek` the first
/// frame is read from the current decode position, which must already be
/// the start of the stream.
///
/// On cancellation the cache is cleared and [`FrameServerError::Cancelled`]
/// is returned. Running out of stream after at least one frame ends the
/// import normally.
pub(crate) fn import_range<D: Decoder>(
    session: &mut DecodeSession<D>,
    cache: &mut FrameCache,
    task: CacheImport,
    skip_initial_seek: bool,
    options: &ImportOptions,
) -> Result<u64, FrameServerError> {
    let timestamps_per_frame = session.info().timestamps_per_frame;
    let total = task.section.frame_count(timestamps_per_frame);
    log::debug!(
        "Importing {} into cache ({total} frames, prepend: {})",
        task.section,
        task.prepend
    );

    cache.set_prepend_block(task.prepend);
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::CacheImport,
        Some(total),
        options.batch_size,
    );

    let result = read_section(session, cache, task.section, total, skip_initial_seek, options, &mut tracker);

    cache.set_prepend_block(false);
    tracker.finish();

    match &result {
        Ok(read) => log::debug!("Import done: {read} frames, cache now {}", cache.working_zone()),
        Err(FrameServerError::Cancelled) => log::debug!("Import cancelled, cache cleared"),
        Err(error) => log::warn!("Import of {} failed: {error}", task.section),
    }
    result
}

fn read_section<D: Decoder>(
    session: &mut DecodeSession<D>,
    cache: &mut FrameCache,
    section: WorkingZone,
    total: u64,
    skip_initial_seek: bool,
    options: &ImportOptions,
    tracker: &mut ProgressTracker,
) -> Result<u64, FrameServerError> {
    if section.is_empty() {
        return Ok(0);
    }

    let first_request = if skip_initial_seek {
        ReadRequest::Next { frames: 1 }
    } else {
        ReadRequest::Seek {
            target: section.start,
            approximate: false,
        }
    };

    let first = session.read_frame(first_request)?;
    let mut timestamp = first.timestamp;
    cache.add(first);
    tracker.advance(Some(timestamp));
    let mut read = 1u64;

    while timestamp < section.end && read < total {
        if options.is_cancelled() {
            cache.clear();
            return Err(FrameServerError::Cancelled);
        }

        let frame = match session.read_frame(ReadRequest::Next { frames: 1 }) {
            Ok(frame) => frame,
            Err(FrameServerError::EndOfStream) => break,
            Err(error) => return Err(error),
        };

        timestamp = frame.timestamp;
        if timestamp > section.end {
            break;
        }
        cache.add(frame);
        tracker.advance(Some(timestamp));
        read += 1;
    }

    Ok(read)
}
