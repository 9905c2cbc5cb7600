use std::collections::VecDeque;

use super::{FrameContainer, floor_index};
use crate::{frame::RawFrame, working_zone::WorkingZone};

/// Every frame of the working zone, in memory.
///
/// Contents always form one contiguous, timestamp-ordered run. Frames are
/// appended at the back, or, while a prepend block is open, inserted in
/// order in front of the existing run. A frame that would break the
/// ordering is dropped.
#[derive(Debug, Default)]
pub struct FrameCache {
    frames: VecDeque<RawFrame>,
    current: usize,
    prepend_block: bool,
    prepend_cursor: usize,
}

impl FrameCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or stop inserting new frames in front of the existing run.
    pub fn set_prepend_block(&mut self, prepend: bool) {
        self.prepend_block = prepend;
        self.prepend_cursor = 0;
    }

    /// The range actually held: first to last cached timestamp.
    pub fn working_zone(&self) -> WorkingZone {
        match (self.frames.front(), self.frames.back()) {
            (Some(first), Some(last)) => WorkingZone::new(first.timestamp, last.timestamp),
            _ => WorkingZone::EMPTY,
        }
    }

    /// Evict every frame outside `zone`.
    ///
    /// Only whole frames are removed, so the resulting
    /// [`working_zone`](Self::working_zone) can be narrower than `zone`.
    /// Calling it again with the same or a wider zone changes nothing.
    pub fn reduce_working_zone(&mut self, zone: WorkingZone) {
        if zone.is_empty() {
            self.clear();
            return;
        }

        let mut evicted_front = 0;
        while self
            .frames
            .front()
            .is_some_and(|frame| frame.timestamp < zone.start)
        {
            self.frames.pop_front();
            evicted_front += 1;
        }

        let mut evicted_back = 0;
        while self
            .frames
            .back()
            .is_some_and(|frame| frame.timestamp > zone.end)
        {
            self.frames.pop_back();
            evicted_back += 1;
        }

        self.current = self
            .current
            .saturating_sub(evicted_front)
            .min(self.frames.len().saturating_sub(1));

        log::debug!(
            "Cache reduced to {}: {evicted_front} frames evicted at start, {evicted_back} at end",
            self.working_zone()
        );
    }

    /// The frame under the playhead.
    pub fn current(&self) -> Option<&RawFrame> {
        self.frames.get(self.current)
    }

    /// Approximate heap footprint of the held pictures.
    pub fn memory_bytes(&self) -> usize {
        self.frames.iter().map(RawFrame::size_in_bytes).sum()
    }

    /// Timestamps of every held frame, in order.
    pub fn timestamps(&self) -> Vec<i64> {
        self.frames.iter().map(|frame| frame.timestamp).collect()
    }

    /// Move to the first frame.
    pub fn move_first(&mut self) -> bool {
        if self.frames.is_empty() {
            return false;
        }
        self.current = 0;
        true
    }

    /// Move to the last frame.
    pub fn move_last(&mut self) -> bool {
        if self.frames.is_empty() {
            return false;
        }
        self.current = self.frames.len() - 1;
        true
    }

    fn insert_prepended(&mut self, frame: RawFrame) {
        let cursor = self.prepend_cursor;
        let after_previous = cursor == 0 || self.frames[cursor - 1].timestamp < frame.timestamp;
        let before_existing = self
            .frames
            .get(cursor)
            .is_none_or(|existing| frame.timestamp < existing.timestamp);

        if !(after_previous && before_existing) {
            return;
        }

        self.frames.insert(cursor, frame);
        self.prepend_cursor += 1;
        if cursor <= self.current {
            self.current += 1;
        }
    }
}

impl FrameContainer for FrameCache {
    fn current_timestamp(&self) -> Option<i64> {
        self.frames.get(self.current).map(|frame| frame.timestamp)
    }

    fn visit_current(&self, visit: &mut dyn FnMut(&RawFrame)) {
        if let Some(frame) = self.current() {
            visit(frame);
        }
    }

    fn move_by(&mut self, frames: i64) -> bool {
        let target = (self.current as i64).saturating_add(frames);
        if self.frames.is_empty() || target < 0 || target >= self.frames.len() as i64 {
            return false;
        }
        self.current = target as usize;
        true
    }

    fn move_to(&mut self, timestamp: i64) -> bool {
        if !self.contains(timestamp) {
            return false;
        }
        match floor_index(&self.frames, timestamp) {
            Some(index) => {
                self.current = index;
                true
            }
            None => false,
        }
    }

    fn contains(&self, timestamp: i64) -> bool {
        self.working_zone().contains(timestamp)
    }

    fn add(&mut self, frame: RawFrame) {
        if self.frames.is_empty() {
            self.frames.push_back(frame);
            self.current = 0;
            if self.prepend_block {
                self.prepend_cursor = 1;
            }
            return;
        }

        if self.prepend_block {
            self.insert_prepended(frame);
        } else if self
            .frames
            .back()
            .is_some_and(|last| last.timestamp < frame.timestamp)
        {
            self.frames.push_back(frame);
        }
    }

    fn clear(&mut self) {
        self.frames.clear();
        self.current = 0;
        self.prepend_cursor = 0;
    }

    fn len(&self) -> usize {
        self.frames.len()
    }
}
