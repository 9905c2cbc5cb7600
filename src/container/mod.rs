//! Frame containers.
//!
//! Each [`DecodingMode`](crate::DecodingMode) stores decoded frames in its
//! own container:
//!
//! | Mode | Container | Holds |
//! |------|-----------|-------|
//! | `OnDemand` | [`SingleFrame`] | the last decoded frame |
//! | `PreBuffering` | [`LookAheadWindow`] | a bounded run fed by the look-ahead thread |
//! | `Caching` | [`FrameCache`] | every frame of the working zone |
//!
//! All three implement [`FrameContainer`], the navigation contract the
//! reader routes requests through. Frames inside a container are always in
//! ascending timestamp order.

mod cache;
mod single;
mod window;

pub use cache::FrameCache;
pub use single::SingleFrame;
pub use window::LookAheadWindow;

use std::collections::VecDeque;

use crate::frame::RawFrame;

/// Uniform navigation over a set of held frames.
///
/// Every method works on memory only; a `false` return means the request
/// could not be satisfied without decoding.
pub trait FrameContainer {
    /// Timestamp of the frame under the playhead.
    fn current_timestamp(&self) -> Option<i64>;

    /// Call `visit` with the frame under the playhead, if any.
    fn visit_current(&self, visit: &mut dyn FnMut(&RawFrame));

    /// Move the playhead by `frames` (negative moves backwards).
    fn move_by(&mut self, frames: i64) -> bool;

    /// Move the playhead to the last frame at or before `timestamp`.
    fn move_to(&mut self, timestamp: i64) -> bool;

    /// Whether `timestamp` falls inside the held range.
    fn contains(&self, timestamp: i64) -> bool;

    /// Store a freshly decoded frame.
    fn add(&mut self, frame: RawFrame);

    /// Release every held frame.
    fn clear(&mut self);

    /// Number of held frames.
    fn len(&self) -> usize;

    /// Whether no frame is held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index of the last frame whose timestamp is `<= timestamp`.
pub(crate) fn floor_index(frames: &VecDeque<RawFrame>, timestamp: i64) -> Option<usize> {
    frames
        .partition_point(|frame| frame.timestamp <= timestamp)
        .checked_sub(1)
}
