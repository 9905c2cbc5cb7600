//! Working-zone interval tests.

use frameserver::WorkingZone;

#[test]
fn inverted_bounds_give_the_empty_zone() {
    assert_eq!(WorkingZone::new(10, 5), WorkingZone::EMPTY);
    assert!(WorkingZone::new(10, 5).is_empty());
    assert!(!WorkingZone::new(5, 5).is_empty());
}

#[test]
fn bounds_are_inclusive() {
    let zone = WorkingZone::new(100, 200);
    assert!(zone.contains(100));
    assert!(zone.contains(200));
    assert!(!zone.contains(99));
    assert!(!zone.contains(201));
}

#[test]
fn empty_zone_contains_and_overlaps_nothing() {
    let empty = WorkingZone::EMPTY;
    assert!(!empty.contains(0));
    assert!(!empty.overlaps(&WorkingZone::new(i64::MIN, i64::MAX)));
    assert!(!WorkingZone::new(0, 10).contains_zone(&empty));
    assert_eq!(empty.duration(), 0);
    assert_eq!(empty.frame_count(10), 0);
    assert_eq!(empty.to_string(), "[empty]");
}

#[test]
fn overlap_and_containment() {
    let zone = WorkingZone::new(0, 100);
    assert!(zone.overlaps(&WorkingZone::new(100, 200)));
    assert!(!zone.overlaps(&WorkingZone::new(101, 200)));
    assert!(zone.contains_zone(&WorkingZone::new(10, 90)));
    assert!(!zone.contains_zone(&WorkingZone::new(10, 110)));
}

#[test]
fn trimming_never_widens() {
    let zone = WorkingZone::new(100, 200);
    assert_eq!(zone.trim_start(150), WorkingZone::new(150, 200));
    assert_eq!(zone.trim_start(50), zone);
    assert_eq!(zone.trim_end(120), WorkingZone::new(100, 120));
    assert_eq!(zone.trim_end(300), zone);
    assert!(zone.trim_start(250).is_empty());
}

#[test]
fn frame_count_includes_both_bounds() {
    assert_eq!(WorkingZone::new(0, 990).frame_count(10), 100);
    assert_eq!(WorkingZone::new(0, 999).frame_count(10), 100);
    assert_eq!(WorkingZone::new(40, 40).frame_count(10), 1);
    assert_eq!(WorkingZone::new(0, 100).frame_count(0), 0);
}

#[test]
fn rollover_jump_wraps_from_end_to_start() {
    let zone = WorkingZone::new(100, 500);
    assert!(zone.is_rollover_jump(500, 100));
    assert!(zone.is_rollover_jump(510, 90));
    assert!(!zone.is_rollover_jump(490, 100));
    assert!(!zone.is_rollover_jump(500, 110));
    assert!(!WorkingZone::EMPTY.is_rollover_jump(500, 100));
}

#[test]
fn display_shows_bounds() {
    assert_eq!(WorkingZone::new(3, 7).to_string(), "[3, 7]");
}
