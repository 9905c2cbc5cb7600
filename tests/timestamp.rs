//! Timestamp reconciliation tests.
//!
//! The reconciler is pure state, so these run without any media.

use frameserver::{TimestampReconciler, TimestampState};

// ── Direct hints ───────────────────────────────────────────────────

#[test]
fn pts_is_used_when_nothing_is_buffered() {
    let mut reconciler = TimestampReconciler::new(10);
    assert_eq!(reconciler.decoded(Some(0), Some(0)), 0);
    assert_eq!(reconciler.decoded(Some(10), Some(10)), 10);
    assert_eq!(reconciler.current(), Some(10));
}

#[test]
fn dts_replaces_a_missing_pts() {
    let mut reconciler = TimestampReconciler::new(10);
    assert_eq!(reconciler.decoded(Some(40), None), 40);
}

#[test]
fn negative_hints_are_ignored() {
    let mut reconciler = TimestampReconciler::new(10);
    assert_eq!(reconciler.decoded(Some(30), Some(-1)), 30);
}

#[test]
fn no_hints_extrapolate_from_the_last_timestamp() {
    let mut reconciler = TimestampReconciler::new(10);
    reconciler.decoded(Some(50), Some(50));
    assert_eq!(reconciler.decoded(None, None), 60);
    assert_eq!(reconciler.decoded(None, None), 70);
}

#[test]
fn no_hints_and_no_history_give_zero() {
    let mut reconciler = TimestampReconciler::new(10);
    assert_eq!(reconciler.decoded(None, None), 0);
}

// ── Reorder buffering ──────────────────────────────────────────────

#[test]
fn buffered_hint_belongs_to_the_next_picture() {
    let mut reconciler = TimestampReconciler::new(10);
    reconciler.buffered(Some(0), Some(0));
    assert_eq!(reconciler.decoded(Some(10), Some(10)), 0);
    assert_eq!(reconciler.state().buffered, Some(10));
    assert_eq!(reconciler.decoded(Some(20), Some(20)), 10);
}

#[test]
fn drained_picture_takes_the_buffered_hint() {
    let mut reconciler = TimestampReconciler::new(10);
    reconciler.buffered(Some(80), Some(80));
    assert_eq!(reconciler.decoded(Some(90), Some(90)), 80);
    assert_eq!(reconciler.decoded(None, None), 90);
    assert_eq!(reconciler.state().buffered, None);
}

#[test]
fn later_buffered_hint_is_not_taken() {
    let mut reconciler = TimestampReconciler::new(10);
    reconciler.buffered(Some(30), Some(30));
    assert_eq!(reconciler.decoded(Some(20), Some(20)), 20);
    assert_eq!(reconciler.state().buffered, Some(30));
}

#[test]
fn buffered_without_hints_records_nothing() {
    let mut reconciler = TimestampReconciler::new(10);
    reconciler.buffered(Some(40), Some(40));
    reconciler.buffered(None, None);
    assert_eq!(reconciler.state().buffered, None);
    assert_eq!(reconciler.current(), None);
}

#[test]
fn buffered_with_negative_dts_records_nothing() {
    let mut reconciler = TimestampReconciler::new(10);
    reconciler.buffered(Some(-5), None);
    assert_eq!(reconciler.state().buffered, None);
}

#[test]
fn reordered_stream_resolves_in_presentation_order() {
    let mut reconciler = TimestampReconciler::new(10);
    let mut resolved = Vec::new();

    reconciler.buffered(Some(0), Some(0));
    for hint in (10..100).step_by(10) {
        resolved.push(reconciler.decoded(Some(hint), Some(hint)));
    }
    resolved.push(reconciler.decoded(None, None));

    let expected: Vec<i64> = (0..100).step_by(10).collect();
    assert_eq!(resolved, expected);
}

// ── Reset ──────────────────────────────────────────────────────────

#[test]
fn reset_forgets_everything() {
    let mut reconciler = TimestampReconciler::new(10);
    reconciler.buffered(Some(20), Some(20));
    reconciler.decoded(Some(30), Some(30));

    reconciler.reset();
    assert_eq!(reconciler.state(), TimestampState::default());
    assert_eq!(reconciler.decoded(None, None), 0);
}
