//! Presentation-timestamp reconciliation.
//!
//! A decoder with an internal reorder buffer reports, alongside each decoded
//! picture, the timestamps of the packet it was just fed. That packet is not
//! necessarily the one the picture came from: when the decoder had buffered
//! an earlier packet, the picture belongs to that one. Some muxers also omit
//! presentation timestamps entirely, or fill them intermittently.
//!
//! [`TimestampReconciler`] tracks the last buffered hint and the last
//! resolved timestamp, and resolves one authoritative timestamp per decoded
//! picture.
//!
//! # Example
//!
//! ```
//! use frameserver::TimestampReconciler;
//!
//! let mut reconciler = TimestampReconciler::new(10);
//!
//! // The decoder swallows the packet with pts 0 ...
//! reconciler.buffered(Some(0), Some(0));
//! // ... and returns its picture when fed the packet with pts 20.
//! assert_eq!(reconciler.decoded(Some(10), Some(20)), 0);
//! ```

/// Snapshot of the reconciler's state.
///
/// `None` marks an unset slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimestampState {
    /// Timestamp of the last decoded picture.
    pub current: Option<i64>,
    /// Last timestamp resolved for a decoded picture.
    pub last_decoded: Option<i64>,
    /// Hint of the packet the decoder is holding back.
    pub buffered: Option<i64>,
}

/// Resolves the timestamp of each decoded picture from packet hints.
#[derive(Debug, Clone)]
pub struct TimestampReconciler {
    state: TimestampState,
    timestamps_per_frame: i64,
}

impl TimestampReconciler {
    /// Create a reconciler for a stream whose frames are
    /// `timestamps_per_frame` ticks apart on average.
    pub fn new(timestamps_per_frame: i64) -> Self {
        Self {
            state: TimestampState::default(),
            timestamps_per_frame,
        }
    }

    /// Forget all buffering state. Required after every seek.
    pub fn reset(&mut self) {
        self.state = TimestampState::default();
    }

    /// The current state.
    pub fn state(&self) -> TimestampState {
        self.state
    }

    /// Timestamp of the last decoded picture, if any.
    pub fn current(&self) -> Option<i64> {
        self.state.current
    }

    /// The decoder consumed a packet without producing a picture.
    ///
    /// Only the buffered slot changes.
    pub fn buffered(&mut self, dts: Option<i64>, pts: Option<i64>) {
        self.state.buffered = valid(pts).or_else(|| valid(dts));
    }

    /// The decoder produced a picture after being fed a packet carrying
    /// these hints. Returns the picture's resolved timestamp.
    pub fn decoded(&mut self, dts: Option<i64>, pts: Option<i64>) -> i64 {
        let current = if let Some(pts) = valid(pts) {
            self.take_buffered_before(pts).unwrap_or(pts)
        } else if let Some(dts) = valid(dts) {
            self.take_buffered_before(dts).unwrap_or(dts)
        } else if let Some(buffered) = self.state.buffered.take() {
            buffered
        } else if let Some(last) = self.state.last_decoded {
            last + self.timestamps_per_frame
        } else {
            0
        };

        self.state.current = Some(current);
        self.state.last_decoded = Some(current);
        current
    }

    /// If a hint earlier than `hint` is buffered, that is the picture just
    /// returned; `hint` takes its place in the buffer.
    fn take_buffered_before(&mut self, hint: i64) -> Option<i64> {
        match self.state.buffered {
            Some(buffered) if buffered < hint => {
                self.state.buffered = Some(hint);
                Some(buffered)
            }
            _ => None,
        }
    }
}

fn valid(hint: Option<i64>) -> Option<i64> {
    hint.filter(|&value| value >= 0)
}
