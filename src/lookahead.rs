//! The look-ahead production thread.
//!
//! While the reader is pre-buffering, a dedicated thread decodes one frame
//! at a time into the [`LookAheadWindow`]. When production passes the end of
//! the working zone, or the stream runs out, it seeks back to the start of
//! the zone and carries on, so looped playback never waits on a seek.
//!
//! Stopping is cooperative: the thread checks a [`CancellationToken`] once
//! per frame. It can also be parked inside a full window, so
//! [`LookAheadWorker::stop`] unblocks the window before joining.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{
    container::LookAheadWindow,
    decoder::Decoder,
    error::FrameServerError,
    progress::CancellationToken,
    session::{ReadRequest, SharedSession},
};

/// Running average of production loop times, reported on every rollover.
#[derive(Debug, Default)]
struct LoopTimer {
    started: Option<Instant>,
    total: Duration,
    loops: u32,
}

impl LoopTimer {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.total += started.elapsed();
            self.loops += 1;
        }
    }

    fn average_ms(&self) -> f64 {
        if self.loops == 0 {
            0.0
        } else {
            self.total.as_secs_f64() * 1000.0 / self.loops as f64
        }
    }

    fn restart(&mut self) {
        *self = Self::default();
    }
}

/// Owner of the production thread.
#[derive(Debug, Default)]
pub(crate) struct LookAheadWorker {
    handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl LookAheadWorker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether a production thread is alive.
    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Spawn the production thread.
    pub(crate) fn start<D: Decoder>(
        &mut self,
        session: SharedSession<D>,
        window: Arc<LookAheadWindow>,
        frame_interval_ms: f64,
    ) -> Result<(), FrameServerError> {
        self.cancellation = CancellationToken::new();
        window.rearm();

        let cancellation = self.cancellation.clone();
        let handle = thread::Builder::new()
            .name("look-ahead".to_string())
            .spawn(move || produce(session, window, cancellation, frame_interval_ms))?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Cancel the production thread and wait for it to exit.
    ///
    /// Does nothing if no thread is running.
    pub(crate) fn stop(&mut self, window: &LookAheadWindow) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        log::debug!("Stopping look-ahead thread");
        self.cancellation.cancel();

        // The thread only sees the cancellation between frames; if it is
        // parked on a full window it has to be woken up first.
        window.unblock_and_make_room();

        if handle.join().is_err() {
            log::error!("Look-ahead thread panicked");
        }
    }
}

fn produce<D: Decoder>(
    session: SharedSession<D>,
    window: Arc<LookAheadWindow>,
    cancellation: CancellationToken,
    frame_interval_ms: f64,
) {
    log::debug!("Look-ahead thread started");
    let mut timer = LoopTimer::default();

    while !cancellation.is_cancelled() {
        timer.start();
        let result = session.lock().read_frame(ReadRequest::Next { frames: 1 });
        let zone = window.working_zone();

        let rollover = match result {
            Ok(frame) if !zone.is_empty() && frame.timestamp > zone.end => true,
            Ok(frame) => {
                timer.stop();
                window.push(frame);
                false
            }
            Err(FrameServerError::FrameNotRead(_) | FrameServerError::EndOfStream) => true,
            Err(error) => {
                log::warn!("Look-ahead frame skipped: {error}");
                false
            }
        };

        if !rollover || cancellation.is_cancelled() {
            continue;
        }

        log::debug!(
            "Average look-ahead loop time: {:.3} ms (interval: {:.3} ms)",
            timer.average_ms(),
            frame_interval_ms
        );
        timer.restart();

        let start = if zone.is_empty() { 0 } else { zone.start };
        let request = ReadRequest::Seek {
            target: start,
            approximate: false,
        };
        let result = session.lock().read_frame(request);
        match result {
            Ok(frame) => window.push(frame),
            Err(error) => {
                log::warn!("Look-ahead rollover to [{start}] failed: {error}");
                thread::sleep(Duration::from_secs_f64(frame_interval_ms.max(1.0) / 1000.0));
            }
        }
    }

    log::debug!("Exiting look-ahead thread");
}
