//! Reader integration tests: opening, on-demand navigation, mode switching
//! and capability enforcement.
//!
//! Everything runs against the synthetic decoder in `common`, so no media
//! fixtures are needed.

mod common;

use common::{SyntheticConfig, SyntheticDecoder, fill_byte, register};
use frameserver::{
    AspectRatioMode, Capabilities, DecodingMode, FrameServerError, ImportOptions, ReaderOptions,
    VideoReader, WorkingZone,
};

type Reader = VideoReader<SyntheticDecoder>;

fn open(name: &str, config: SyntheticConfig) -> Reader {
    let (path, _) = register(name, config);
    Reader::open(&path, ReaderOptions::new()).expect("Failed to open synthetic media")
}

// ── Opening ────────────────────────────────────────────────────────

#[test]
fn regular_media_opens_on_demand() {
    let reader = open("reader-open", SyntheticConfig::default());

    assert_eq!(reader.mode(), DecodingMode::OnDemand);
    assert_eq!(reader.capabilities(), Capabilities::full());
    assert_eq!(reader.working_zone(), WorkingZone::new(0, 990));
    assert!(!reader.is_very_short());
    assert_eq!(reader.held_frames(), 0);
    assert_eq!(reader.decoding_size(), (8, 4));
    assert_eq!(reader.aspect_ratio_size(), (8, 4));
}

#[test]
fn unknown_path_fails_to_open() {
    let result = Reader::open("synthetic://never-registered", ReaderOptions::new());
    assert!(matches!(result, Err(FrameServerError::FileOpen { .. })));
}

#[test]
fn very_short_media_is_cached_whole() {
    let (path, stats) = register("reader-very-short", SyntheticConfig::default().with_frames(20));
    let mut reader = Reader::open(&path, ReaderOptions::new()).expect("Failed to open");

    assert!(reader.is_very_short());
    assert_eq!(reader.mode(), DecodingMode::Caching);
    assert_eq!(reader.capabilities(), Capabilities::cache_only());
    assert_eq!(reader.working_zone(), WorkingZone::new(0, 190));

    let expected: Vec<i64> = (0..20).map(|index| index * 10).collect();
    assert_eq!(reader.cached_timestamps(), expected);

    let packets = stats.packets();
    assert!(reader.advance(0, true));
    assert!(reader.move_last());
    assert_eq!(reader.current_timestamp(), Some(190));
    assert!(reader.seek_to(155));
    assert_eq!(reader.current_timestamp(), Some(150));
    assert_eq!(stats.packets(), packets, "navigation inside the cache decoded");
}

#[test]
fn very_short_threshold_is_configurable() {
    let (path, _) = register("reader-threshold", SyntheticConfig::default().with_frames(20));
    let options = ReaderOptions::new().with_very_short_threshold(10);
    let reader = Reader::open(&path, options).expect("Failed to open");

    assert!(!reader.is_very_short());
    assert_eq!(reader.mode(), DecodingMode::OnDemand);
}

// ── On-demand navigation ───────────────────────────────────────────

#[test]
fn on_demand_advance_decodes_sequentially() {
    let mut reader = open("reader-advance", SyntheticConfig::default());

    let mut seen = Vec::new();
    for _ in 0..3 {
        assert!(reader.advance(0, true));
        seen.push(reader.current_timestamp().expect("a frame"));
    }
    assert_eq!(seen, vec![0, 10, 20]);

    assert!(reader.advance(2, true));
    assert_eq!(reader.current_timestamp(), Some(50));
    assert_eq!(
        reader.with_current_frame(|frame| frame.picture.data[0]),
        Some(fill_byte(5))
    );
    assert_eq!(reader.held_frames(), 1);
}

#[test]
fn on_demand_seek_lands_on_the_target() {
    let (path, stats) = register("reader-seek", SyntheticConfig::default());
    let mut reader = Reader::open(&path, ReaderOptions::new()).expect("Failed to open");

    assert!(reader.seek_to(370));
    assert_eq!(reader.current_timestamp(), Some(370));
    assert_eq!(stats.seeks(), 1);
    // Keyframe at 300, decoded forward to 370.
    assert_eq!(stats.packets(), 8);

    let frame = reader.current_frame().expect("a frame");
    assert_eq!(frame.picture.data[0], fill_byte(37));
}

#[test]
fn overshooting_seek_is_corrected_once() {
    let (path, stats) = register(
        "reader-overshoot",
        SyntheticConfig::default().with_overshooting_seeks(1, 5),
    );
    let options = ReaderOptions::new().with_seek_retry_margin(0.1);
    let mut reader = Reader::open(&path, options).expect("Failed to open");

    assert!(reader.seek_to(500));
    assert_eq!(reader.current_timestamp(), Some(500));
    assert_eq!(stats.seeks(), 2);
}

#[test]
fn huge_skip_runs_out_of_stream_instead_of_wrapping() {
    let (path, stats) = register("reader-huge-skip", SyntheticConfig::default());
    let mut reader = Reader::open(&path, ReaderOptions::new()).expect("Failed to open");

    assert!(!reader.advance(usize::MAX, true));
    assert_eq!(stats.packets(), 100);
}

#[test]
fn seek_before_the_stream_start_is_not_corrected() {
    let (path, stats) = register("reader-negative-seek", SyntheticConfig::default());
    let mut reader = Reader::open(&path, ReaderOptions::new()).expect("Failed to open");

    assert!(reader.seek_to(-50));
    assert_eq!(reader.current_timestamp(), Some(0));
    assert_eq!(stats.seeks(), 1);
    assert_eq!(stats.packets(), 1);
}

#[test]
fn reordering_decoder_yields_real_timestamps() {
    let mut reader = open("reader-reorder", SyntheticConfig::default().with_reorder());

    for expected in [0, 10, 20, 30] {
        assert!(reader.advance(0, true));
        assert_eq!(reader.current_timestamp(), Some(expected));
        assert_eq!(
            reader.with_current_frame(|frame| frame.picture.data[0]),
            Some(fill_byte(expected as usize / 10))
        );
    }

    assert!(reader.seek_to(250));
    assert_eq!(reader.current_timestamp(), Some(250));
    assert_eq!(
        reader.with_current_frame(|frame| frame.picture.data[0]),
        Some(fill_byte(25))
    );
}

#[test]
fn reordered_stream_drains_its_last_frame() {
    let mut reader = open("reader-reorder-drain", SyntheticConfig::default().with_reorder());

    assert!(reader.seek_to(980));
    assert!(reader.advance(0, true));
    assert_eq!(reader.current_timestamp(), Some(990));
    assert!(!reader.advance(0, true));
}

#[test]
fn missing_presentation_timestamps_fall_back_to_decode_timestamps() {
    let mut reader = open("reader-missing-pts", SyntheticConfig::default().with_missing_pts());

    assert!(reader.advance(0, true));
    assert!(reader.advance(0, true));
    assert_eq!(reader.current_timestamp(), Some(10));
    assert!(reader.seek_to(420));
    assert_eq!(reader.current_timestamp(), Some(420));
}

#[test]
fn first_decoded_frame_corrects_the_first_timestamp() {
    let mut reader = open(
        "reader-first-timestamp",
        SyntheticConfig::default().with_first_timestamp(0, 20),
    );
    assert_eq!(reader.info().first_timestamp, 0);

    assert!(reader.advance(0, true));
    assert_eq!(reader.current_timestamp(), Some(20));
    assert_eq!(reader.info().first_timestamp, 20);
    assert_eq!(reader.working_zone().start, 20);
}

#[test]
fn read_errors_leave_the_reader_usable() {
    let mut reader = open("reader-read-error", SyntheticConfig::default().with_failure_at(3));

    for _ in 0..3 {
        assert!(reader.advance(0, true));
    }
    assert!(!reader.advance(0, true));
    assert_eq!(reader.current_timestamp(), Some(20));

    assert!(reader.advance(0, true));
    assert_eq!(reader.current_timestamp(), Some(40));
}

#[test]
fn end_of_stream_stops_advancing() {
    let mut reader = open("reader-end", SyntheticConfig::default());
    assert!(reader.seek_to(990));
    assert!(!reader.advance(0, true));
    assert_eq!(reader.current_timestamp(), Some(990));
}

#[test]
fn first_last_and_previous_on_demand() {
    let mut reader = open("reader-first-last", SyntheticConfig::default());

    assert!(reader.seek_to(300));
    assert!(reader.move_previous());
    assert_eq!(reader.current_timestamp(), Some(290));

    assert!(reader.move_last());
    assert_eq!(reader.current_timestamp(), Some(990));

    assert!(reader.move_first());
    assert_eq!(reader.current_timestamp(), Some(0));
    assert!(!reader.move_previous());
}

// ── Mode switching ─────────────────────────────────────────────────

#[test]
fn mode_round_trip_restores_the_position() {
    let mut reader = open("reader-round-trip", SyntheticConfig::default());
    assert!(reader.seek_to(300));

    reader
        .switch_mode(DecodingMode::PreBuffering)
        .expect("pre-buffering allowed");
    assert!(reader.is_prebuffering());
    assert_eq!(reader.current_timestamp(), Some(300));

    reader
        .switch_mode(DecodingMode::Caching)
        .expect("caching allowed");
    assert!(!reader.is_prebuffering());
    assert_eq!(reader.held_frames(), 0);

    reader
        .switch_mode(DecodingMode::OnDemand)
        .expect("on-demand allowed");
    assert_eq!(reader.current_timestamp(), Some(300));
}

#[test]
fn switching_to_the_same_mode_is_a_no_op() {
    let (path, stats) = register("reader-same-mode", SyntheticConfig::default());
    let mut reader = Reader::open(&path, ReaderOptions::new()).expect("Failed to open");
    reader.seek_to(100);
    let packets = stats.packets();

    reader
        .switch_mode(DecodingMode::OnDemand)
        .expect("same mode");
    assert_eq!(stats.packets(), packets);
    assert_eq!(reader.current_timestamp(), Some(100));
}

#[test]
fn enumeration_suspends_and_resumes_prebuffering() {
    let mut reader = open("reader-enumeration", SyntheticConfig::default());
    reader.post_load().expect("post load");
    assert_eq!(reader.mode(), DecodingMode::PreBuffering);

    reader.before_enumeration().expect("before enumeration");
    assert_eq!(reader.mode(), DecodingMode::OnDemand);
    assert!(!reader.is_prebuffering());

    reader.after_enumeration().expect("after enumeration");
    assert_eq!(reader.mode(), DecodingMode::PreBuffering);
    assert!(reader.is_prebuffering());

    // Nothing to resume a second time.
    reader
        .switch_mode(DecodingMode::OnDemand)
        .expect("on-demand allowed");
    reader.after_enumeration().expect("after enumeration");
    assert_eq!(reader.mode(), DecodingMode::OnDemand);
}

#[test]
fn before_playloop_starts_prebuffering() {
    let mut reader = open("reader-playloop", SyntheticConfig::default());
    reader.before_playloop().expect("before playloop");
    assert_eq!(reader.mode(), DecodingMode::PreBuffering);
    assert!(reader.is_prebuffering());
}

// ── Capabilities ───────────────────────────────────────────────────

#[test]
fn very_short_media_refuses_other_modes() {
    let mut reader = open("reader-caps", SyntheticConfig::default().with_frames(10));

    for mode in [DecodingMode::OnDemand, DecodingMode::PreBuffering] {
        assert!(matches!(
            reader.switch_mode(mode),
            Err(FrameServerError::CapabilityNotSupported(_))
        ));
    }
    assert!(matches!(
        reader.update_working_zone(WorkingZone::new(0, 50), false, &ImportOptions::new()),
        Err(FrameServerError::CapabilityNotSupported(_))
    ));
    assert!(matches!(
        reader.change_decoding_size(4, 2),
        Err(FrameServerError::CapabilityNotSupported(_))
    ));
    assert!(matches!(
        reader.change_aspect_ratio(AspectRatioMode::Force4x3),
        Err(FrameServerError::CapabilityNotSupported(_))
    ));
    assert!(matches!(
        reader.change_deinterlace(true),
        Err(FrameServerError::CapabilityNotSupported(_))
    ));
    assert_eq!(reader.mode(), DecodingMode::Caching);
}

#[test]
fn closed_reader_is_not_loaded() {
    let mut reader = open("reader-close", SyntheticConfig::default());
    reader.advance(0, true);
    reader.close();

    assert_eq!(reader.mode(), DecodingMode::Uninitialized);
    assert_eq!(reader.held_frames(), 0);
    assert!(!reader.advance(0, true));
    assert!(!reader.seek_to(0));
    assert!(matches!(
        reader.update_working_zone(WorkingZone::new(0, 100), false, &ImportOptions::new()),
        Err(FrameServerError::NotLoaded)
    ));
}

// ── Output settings ────────────────────────────────────────────────

#[test]
fn decoding_size_only_changes_while_prebuffering() {
    let mut reader = open("reader-decoding-size", SyntheticConfig::default());

    reader.change_decoding_size(4, 2).expect("allowed");
    assert_eq!(reader.decoding_size(), (8, 4));
    assert!(!reader.can_draw_unscaled());

    reader.post_load().expect("post load");
    reader.change_decoding_size(4, 2).expect("allowed");
    assert_eq!(reader.decoding_size(), (4, 2));
    assert!(reader.can_draw_unscaled());
    assert!(reader.advance(0, true));
    assert_eq!(
        reader.with_current_frame(|frame| (frame.picture.width, frame.picture.height)),
        Some((4, 2))
    );

    reader.disable_custom_decoding_size().expect("allowed");
    assert_eq!(reader.decoding_size(), (8, 4));
    assert!(!reader.can_draw_unscaled());

    reader.change_decoding_size(4, 2).expect("allowed");
    reader
        .switch_mode(DecodingMode::OnDemand)
        .expect("on-demand allowed");
    assert_eq!(reader.decoding_size(), (8, 4));
}

#[test]
fn aspect_ratio_change_resizes_output() {
    let mut reader = open("reader-aspect", SyntheticConfig::default());

    reader
        .change_aspect_ratio(AspectRatioMode::Force4x3)
        .expect("allowed");
    assert_eq!(reader.aspect_ratio_size(), (8, 6));
    assert_eq!(reader.decoding_size(), (8, 6));

    assert!(reader.advance(0, true));
    let frame = reader.current_frame().expect("a frame");
    assert_eq!((frame.picture.width, frame.picture.height), (8, 6));
    assert_eq!(reader.options().aspect_ratio(), AspectRatioMode::Force4x3);
}

#[test]
fn deinterlace_toggle_drops_held_frames() {
    let mut reader = open("reader-deinterlace", SyntheticConfig::default());
    assert!(reader.advance(0, true));
    assert_eq!(reader.held_frames(), 1);

    reader.change_deinterlace(true).expect("allowed");
    assert!(reader.options().deinterlace());
    assert_eq!(reader.held_frames(), 0);
}
