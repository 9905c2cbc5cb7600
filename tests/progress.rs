//! Progress and cancellation tests.

mod common;

use std::sync::{Arc, Mutex};

use common::{SyntheticConfig, SyntheticDecoder, register};
use frameserver::{
    CancellationToken, ImportOptions, OperationType, ProgressCallback, ProgressInfo,
    ReaderOptions, VideoReader, WorkingZone,
};

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    let token = CancellationToken::new();
    assert!(!token.is_cancelled());
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());

    clone.reset();
    assert!(!token.is_cancelled());
}

// ── ProgressInfo ───────────────────────────────────────────────────

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

fn import_with_progress(name: &str, batch_size: u64) -> Vec<ProgressInfo> {
    let (path, _) = register(name, SyntheticConfig::default().with_frames(60));
    let mut reader = VideoReader::<SyntheticDecoder>::open(&path, ReaderOptions::new())
        .expect("Failed to open synthetic media");

    let recorder = Arc::new(RecordingProgress {
        infos: Mutex::new(Vec::new()),
    });
    let options = ImportOptions::new()
        .with_progress(recorder.clone())
        .with_batch_size(batch_size);
    reader
        .update_working_zone(WorkingZone::new(0, 590), false, &options)
        .expect("Failed to import");

    let infos = recorder.infos.lock().unwrap().clone();
    infos
}

#[test]
fn progress_reports_cache_import_operation() {
    let infos = import_with_progress("progress-operation", 1);
    assert!(!infos.is_empty(), "Expected progress callbacks");
    for info in &infos {
        assert_eq!(info.operation, OperationType::CacheImport);
    }
}

#[test]
fn progress_current_increases() {
    let infos = import_with_progress("progress-increases", 1);
    for window in infos.windows(2) {
        assert!(
            window[1].current >= window[0].current,
            "Progress current should be non-decreasing",
        );
    }
}

#[test]
fn progress_timestamps_follow_the_frames() {
    let infos = import_with_progress("progress-timestamps", 1);
    let timestamps: Vec<i64> = infos
        .iter()
        .filter_map(|info| info.current_timestamp)
        .collect();
    let expected: Vec<i64> = (0..60).map(|index| index * 10).collect();
    assert_eq!(timestamps, expected);
}

#[test]
fn progress_batches_reduce_callbacks() {
    let every_frame = import_with_progress("progress-batch-1", 1);
    let batched = import_with_progress("progress-batch-20", 20);
    assert_eq!(every_frame.len(), 61);
    assert_eq!(batched.len(), 4);
}

#[test]
fn progress_estimates_remaining_time() {
    let infos = import_with_progress("progress-remaining", 1);
    let last = infos.last().expect("final report");
    assert_eq!(last.estimated_remaining.map(|remaining| remaining.is_zero()), Some(true));
    assert_eq!(last.percentage, Some(100.0));
}

// ── OperationType Debug ────────────────────────────────────────────

#[test]
fn operation_type_debug() {
    assert_eq!(format!("{:?}", OperationType::CacheImport), "CacheImport");
    assert_eq!(format!("{:?}", OperationType::Summary), "Summary");
}
