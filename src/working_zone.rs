//! The working zone: an inclusive timestamp interval.

use std::fmt;

/// An inclusive `[start, end]` timestamp range.
///
/// [`WorkingZone::EMPTY`] is the distinguished empty value. Every non-empty
/// zone satisfies `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkingZone {
    /// First timestamp in the zone.
    pub start: i64,
    /// Last timestamp in the zone.
    pub end: i64,
}

impl WorkingZone {
    /// The empty zone. Contains nothing and overlaps nothing.
    pub const EMPTY: WorkingZone = WorkingZone {
        start: i64::MAX,
        end: i64::MIN,
    };

    /// Create a zone. Inverted bounds produce [`WorkingZone::EMPTY`].
    pub fn new(start: i64, end: i64) -> Self {
        if start > end {
            Self::EMPTY
        } else {
            Self { start, end }
        }
    }

    /// Whether this is the empty zone.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Whether `timestamp` lies within the zone, bounds included.
    pub fn contains(&self, timestamp: i64) -> bool {
        !self.is_empty() && timestamp >= self.start && timestamp <= self.end
    }

    /// Whether `other` lies entirely within this zone.
    pub fn contains_zone(&self, other: &WorkingZone) -> bool {
        !other.is_empty() && self.contains(other.start) && self.contains(other.end)
    }

    /// Whether the two zones share at least one timestamp.
    pub fn overlaps(&self, other: &WorkingZone) -> bool {
        !self.is_empty() && !other.is_empty() && self.start <= other.end && other.start <= self.end
    }

    /// The zone with its start moved up to `start`.
    #[must_use]
    pub fn trim_start(&self, start: i64) -> Self {
        Self::new(self.start.max(start), self.end)
    }

    /// The zone with its end moved down to `end`.
    #[must_use]
    pub fn trim_end(&self, end: i64) -> Self {
        Self::new(self.start, self.end.min(end))
    }

    /// Whether moving from `last` to `target` wraps from the end of the zone
    /// back to its start.
    pub fn is_rollover_jump(&self, last: i64, target: i64) -> bool {
        !self.is_empty() && last >= self.end && target <= self.start
    }

    /// Length in timestamps, 0 for the empty zone.
    pub fn duration(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start
        }
    }

    /// Number of frames in the zone, bounds included.
    pub fn frame_count(&self, timestamps_per_frame: i64) -> u64 {
        if self.is_empty() || timestamps_per_frame <= 0 {
            return 0;
        }
        ((self.duration() + timestamps_per_frame) / timestamps_per_frame) as u64
    }
}

impl Default for WorkingZone {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for WorkingZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[empty]")
        } else {
            write!(f, "[{}, {}]", self.start, self.end)
        }
    }
}
