use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::FrameContainer;
use crate::{frame::RawFrame, working_zone::WorkingZone};

#[derive(Debug)]
struct WindowState {
    frames: VecDeque<RawFrame>,
    current: Option<usize>,
    capacity: usize,
    zone: WorkingZone,
    drops: u64,
    unblocked: bool,
}

impl WindowState {
    fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }

    /// Evict the oldest frame if it is behind the playhead.
    fn evict_behind_playhead(&mut self) -> bool {
        match self.current {
            Some(current) if current > 0 => {
                self.frames.pop_front();
                self.current = Some(current - 1);
                true
            }
            _ => false,
        }
    }

    fn push_back(&mut self, frame: RawFrame) {
        self.frames.push_back(frame);
        if self.current.is_none() {
            self.current = Some(0);
        }
    }
}

/// A bounded run of upcoming frames, produced by the look-ahead thread and
/// consumed by the reader.
///
/// Frames are kept in production order. Within one pass over the working
/// zone that is ascending timestamp order; a rollover starts a new ascending
/// run after the previous one.
///
/// The producer calls [`push`](Self::push), which blocks while the window is
/// full and the playhead sits on the oldest frame. Frames behind the
/// playhead are recycled first. [`unblock_and_make_room`](Self::unblock_and_make_room)
/// releases a blocked producer during shutdown; it is a separate primitive
/// from normal backpressure.
///
/// All methods take `&self`; the window is shared through an [`Arc`].
#[derive(Debug)]
pub struct LookAheadWindow {
    state: Mutex<WindowState>,
    not_full: Condvar,
}

impl LookAheadWindow {
    /// Create an empty window holding at most `capacity` frames (at least 2).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(WindowState {
                frames: VecDeque::with_capacity(capacity.max(2)),
                current: None,
                capacity: capacity.max(2),
                zone: WorkingZone::EMPTY,
                drops: 0,
                unblocked: false,
            }),
            not_full: Condvar::new(),
        }
    }

    /// Maximum number of frames held.
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Add a frame produced by the look-ahead thread, waiting for room.
    ///
    /// Once the window has been unblocked for shutdown the frame is always
    /// accepted, even if that takes the window one frame over capacity.
    pub fn push(&self, frame: RawFrame) {
        let mut state = self.state.lock();

        while state.is_full() && !state.evict_behind_playhead() && !state.unblocked {
            self.not_full.wait(&mut state);
        }

        state.push_back(frame);
    }

    /// Add a frame without ever blocking, evicting the oldest frames as
    /// needed. Used by synchronous reads while production is stopped.
    pub fn push_evicting(&self, frame: RawFrame) {
        let mut state = self.state.lock();
        while state.is_full() {
            if !state.evict_behind_playhead() {
                state.frames.pop_front();
            }
        }
        state.push_back(frame);
    }

    /// Release a producer blocked in [`push`](Self::push) and keep every
    /// later push from blocking until [`rearm`](Self::rearm).
    pub fn unblock_and_make_room(&self) {
        let mut state = self.state.lock();
        state.unblocked = true;
        state.evict_behind_playhead();
        drop(state);
        self.not_full.notify_all();
    }

    /// Restore normal backpressure before production restarts.
    pub fn rearm(&self) {
        self.state.lock().unblocked = false;
    }

    /// Set the zone production loops over.
    pub fn update_working_zone(&self, zone: WorkingZone) {
        self.state.lock().zone = zone;
    }

    /// The zone production loops over.
    pub fn working_zone(&self) -> WorkingZone {
        self.state.lock().zone
    }

    /// Whether at least `skip + 1` frames are available ahead of the
    /// playhead.
    pub fn has_next(&self, skip: usize) -> bool {
        let state = self.state.lock();
        match state.current {
            Some(current) => current.saturating_add(skip).saturating_add(1) < state.frames.len(),
            None => false,
        }
    }

    /// Number of frames held ahead of the playhead.
    pub fn frames_ahead(&self) -> usize {
        let state = self.state.lock();
        match state.current {
            Some(current) => state.frames.len() - current - 1,
            None => 0,
        }
    }

    /// Whether jumping to `target` wraps from the end of the zone to its
    /// start, which keeps the run consistent with what production does.
    pub fn is_rollover_jump(&self, target: i64) -> bool {
        let state = self.state.lock();
        state
            .frames
            .back()
            .is_some_and(|last| state.zone.is_rollover_jump(last.timestamp, target))
    }

    /// Frames skipped by forward moves since the last reset.
    pub fn drops(&self) -> u64 {
        self.state.lock().drops
    }

    /// Count `frames` skipped outside [`move_by`](Self::move_by).
    pub(crate) fn add_drops(&self, frames: u64) {
        self.state.lock().drops += frames;
    }

    /// Zero the drop counter.
    pub fn reset_drops(&self) {
        self.state.lock().drops = 0;
    }

    /// Timestamp of the newest frame.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.state.lock().frames.back().map(|frame| frame.timestamp)
    }

    /// Number of held frames.
    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Whether no frame is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of the frame under the playhead.
    pub fn current_timestamp(&self) -> Option<i64> {
        let state = self.state.lock();
        state
            .current
            .and_then(|index| state.frames.get(index))
            .map(|frame| frame.timestamp)
    }

    /// Call `visit` with the frame under the playhead, holding the lock for
    /// the duration of the call.
    pub fn with_current<R>(&self, visit: impl FnOnce(&RawFrame) -> R) -> Option<R> {
        let state = self.state.lock();
        state
            .current
            .and_then(|index| state.frames.get(index))
            .map(visit)
    }

    /// Move the playhead by `frames`.
    pub fn move_by(&self, frames: i64) -> bool {
        let mut state = self.state.lock();
        let Some(current) = state.current else {
            return false;
        };

        let target = (current as i64).saturating_add(frames);
        if target < 0 || target >= state.frames.len() as i64 {
            return false;
        }

        if frames > 1 {
            state.drops += (frames - 1) as u64;
        }
        state.current = Some(target as usize);
        drop(state);
        self.not_full.notify_all();
        true
    }

    /// Move the playhead to the last frame at or before `timestamp`.
    pub fn move_to(&self, timestamp: i64) -> bool {
        let mut state = self.state.lock();
        let Some(index) = Self::locate(&state, timestamp) else {
            return false;
        };
        state.current = Some(index);
        drop(state);
        self.not_full.notify_all();
        true
    }

    /// Whether `timestamp` falls between two consecutive held frames, or on
    /// the newest one.
    pub fn contains(&self, timestamp: i64) -> bool {
        Self::locate(&self.state.lock(), timestamp).is_some()
    }

    /// Release every held frame.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.frames.clear();
        state.current = None;
        drop(state);
        self.not_full.notify_all();
    }

    /// Index of the frame showing at `timestamp`.
    ///
    /// After a rollover the run holds the end of the zone followed by its
    /// start, so the search walks consecutive pairs instead of assuming one
    /// ascending range.
    fn locate(state: &WindowState, timestamp: i64) -> Option<usize> {
        let frames = &state.frames;
        let within_pair = (1..frames.len()).find(|&index| {
            frames[index - 1].timestamp <= timestamp && timestamp < frames[index].timestamp
        });

        within_pair.map(|index| index - 1).or_else(|| {
            frames
                .back()
                .filter(|last| last.timestamp == timestamp)
                .map(|_| frames.len() - 1)
        })
    }
}

impl FrameContainer for Arc<LookAheadWindow> {
    fn current_timestamp(&self) -> Option<i64> {
        LookAheadWindow::current_timestamp(self)
    }

    fn visit_current(&self, visit: &mut dyn FnMut(&RawFrame)) {
        self.with_current(|frame| visit(frame));
    }

    fn move_by(&mut self, frames: i64) -> bool {
        LookAheadWindow::move_by(self, frames)
    }

    fn move_to(&mut self, timestamp: i64) -> bool {
        LookAheadWindow::move_to(self, timestamp)
    }

    fn contains(&self, timestamp: i64) -> bool {
        LookAheadWindow::contains(self, timestamp)
    }

    fn add(&mut self, frame: RawFrame) {
        self.push_evicting(frame);
    }

    fn clear(&mut self) {
        LookAheadWindow::clear(self);
    }

    fn len(&self) -> usize {
        LookAheadWindow::len(self)
    }
}
