use super::FrameContainer;
use crate::frame::RawFrame;

/// Holds at most one frame: the last one decoded.
#[derive(Debug, Default)]
pub struct SingleFrame {
    frame: Option<RawFrame>,
}

impl SingleFrame {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The held frame, if any.
    pub fn frame(&self) -> Option<&RawFrame> {
        self.frame.as_ref()
    }
}

impl FrameContainer for SingleFrame {
    fn current_timestamp(&self) -> Option<i64> {
        self.frame.as_ref().map(|frame| frame.timestamp)
    }

    fn visit_current(&self, visit: &mut dyn FnMut(&RawFrame)) {
        if let Some(frame) = &self.frame {
            visit(frame);
        }
    }

    fn move_by(&mut self, frames: i64) -> bool {
        frames == 0 && self.frame.is_some()
    }

    fn move_to(&mut self, timestamp: i64) -> bool {
        self.contains(timestamp)
    }

    fn contains(&self, timestamp: i64) -> bool {
        self.current_timestamp() == Some(timestamp)
    }

    fn add(&mut self, frame: RawFrame) {
        self.frame = Some(frame);
    }

    fn clear(&mut self) {
        self.frame = None;
    }

    fn len(&self) -> usize {
        usize::from(self.frame.is_some())
    }
}
