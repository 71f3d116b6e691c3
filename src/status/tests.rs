//! Tests for the status table.

use super::*;
use crate::error::QueueError;
use crate::identity::WorkerId;
use crate::lock::{LockFile, LockMode};
use tempfile::TempDir;

fn open(temp: &TempDir) -> StatusTable {
    StatusTable::open(temp.path().join("done"), SlotFormat::default()).unwrap()
}

fn positions(scan: SlotScan<'_>) -> Vec<usize> {
    scan.map(|s| s.position).collect()
}

#[test]
fn test_new_table_is_empty() {
    let temp = TempDir::new().unwrap();
    let mut table = open(&temp);

    let view = table.view().unwrap();
    assert!(view.is_empty());
    assert!(positions(view.scan_free(10)).is_empty());
    drop(view);

    assert_eq!(table.summary().unwrap(), StatusSummary::default());
}

#[test]
fn test_grow_to_appends_free_slots_and_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let mut table = open(&temp);
    let path = table.path().to_path_buf();

    {
        let mut view = table.view().unwrap();
        assert_eq!(view.grow_to(3).unwrap(), 3);
        assert_eq!(view.len(), 3);
    }
    let first = std::fs::read(&path).unwrap();
    let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
    assert_eq!(first, b"\xAA\x00\x00\xAA\x00\x00\xAA\x00\x00");

    {
        let mut view = table.view().unwrap();
        assert_eq!(view.grow_to(3).unwrap(), 0);
        assert_eq!(view.grow_to(1).unwrap(), 0);
    }
    assert_eq!(std::fs::read(&path).unwrap(), first);
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
}

#[test]
fn test_grow_keeps_existing_slots() {
    let temp = TempDir::new().unwrap();
    let mut table = open(&temp);

    let mut view = table.view().unwrap();
    view.grow_to(2).unwrap();
    view.claim(0, WorkerId(7)).unwrap();
    view.mark_done(1).unwrap();
    view.grow_to(4).unwrap();

    assert_eq!(view.state(0), Some(SlotState::Claimed(WorkerId(7))));
    assert_eq!(view.state(1), Some(SlotState::Done));
    assert_eq!(view.state(3), Some(SlotState::Free));
    assert_eq!(view.state(4), None);
}

#[test]
fn test_byte_level_slot_states() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("done");
    std::fs::write(&path, b"\xAA\x00\x00\xAA\x05\x00\xAA\x00\x05\xAA\xFF\xFF").unwrap();
    let mut table = StatusTable::open(&path, SlotFormat::default()).unwrap();

    let view = table.view().unwrap();
    assert_eq!(view.state(0), Some(SlotState::Free));
    assert_eq!(view.state(1), Some(SlotState::Claimed(WorkerId(5))));
    assert_eq!(view.state(2), Some(SlotState::Claimed(WorkerId(1280))));
    assert_eq!(view.state(3), Some(SlotState::Done));

    assert_eq!(positions(view.scan_free(10)), vec![0]);
    assert_eq!(positions(view.scan_claimed(10)), vec![1, 2]);
    assert_eq!(positions(view.scan_done(10)), vec![3]);
}

#[test]
fn test_claim_writes_little_endian_id() {
    let temp = TempDir::new().unwrap();
    let mut table = open(&temp);
    let path = table.path().to_path_buf();

    {
        let mut view = table.view().unwrap();
        view.grow_to(2).unwrap();
        view.claim(1, WorkerId(5)).unwrap();
        view.flush().unwrap();
    }

    assert_eq!(
        std::fs::read(&path).unwrap(),
        b"\xAA\x00\x00\xAA\x05\x00".to_vec()
    );
}

#[test]
fn test_done_slot_cannot_be_claimed() {
    let temp = TempDir::new().unwrap();
    let mut table = open(&temp);

    let mut view = table.view().unwrap();
    view.grow_to(1).unwrap();
    view.claim(0, WorkerId(1)).unwrap();
    view.mark_done(0).unwrap();

    assert!(view.claim(0, WorkerId(2)).is_err());
    assert_eq!(view.state(0), Some(SlotState::Done));
    assert!(positions(view.scan_free(10)).is_empty());
    assert!(positions(view.scan_claimed(10)).is_empty());
}

#[test]
fn test_claim_rejects_unrepresentable_ids() {
    let temp = TempDir::new().unwrap();
    let mut table = open(&temp);

    let mut view = table.view().unwrap();
    view.grow_to(1).unwrap();

    assert!(matches!(
        view.claim(0, WorkerId(0)),
        Err(QueueError::IdSpaceExhausted(0))
    ));
    assert!(matches!(
        view.claim(0, WorkerId(0xFFFF)),
        Err(QueueError::IdSpaceExhausted(0xFFFF))
    ));
    assert!(view.claim(0, WorkerId(0xFFFE)).is_ok());
}

#[test]
fn test_out_of_range_slot_is_an_error() {
    let temp = TempDir::new().unwrap();
    let mut table = open(&temp);

    let mut view = table.view().unwrap();
    view.grow_to(1).unwrap();

    assert!(view.mark_done(1).is_err());
    assert!(view.claim(5, WorkerId(1)).is_err());
}

#[test]
fn test_misaligned_file_is_corrupt() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("done");
    std::fs::write(&path, b"\xAA\x00\x00\xAA").unwrap();
    let mut table = StatusTable::open(&path, SlotFormat::default()).unwrap();

    assert!(matches!(table.view(), Err(QueueError::Corrupt { .. })));

    // The failed view released its lock.
    let mut other = LockFile::open(&path).unwrap();
    assert!(other.try_lock(LockMode::Exclusive).unwrap());
}

#[test]
fn test_table_mark_done_uses_fresh_lock() {
    let temp = TempDir::new().unwrap();
    let mut table = open(&temp);
    table.view().unwrap().grow_to(2).unwrap();

    table.mark_done(1).unwrap();

    let summary = table.summary().unwrap();
    assert_eq!(summary.free, 1);
    assert_eq!(summary.done, 1);
    assert_eq!(summary.total(), 2);
}

#[test]
fn test_release_claimed_resets_only_claimed() {
    let temp = TempDir::new().unwrap();
    let mut table = open(&temp);

    {
        let mut view = table.view().unwrap();
        view.grow_to(4).unwrap();
        view.claim(0, WorkerId(3)).unwrap();
        view.claim(1, WorkerId(4)).unwrap();
        view.mark_done(2).unwrap();
        assert_eq!(view.release_claimed().unwrap(), 2);
    }

    let summary = table.summary().unwrap();
    assert_eq!(summary.free, 3);
    assert_eq!(summary.claimed, 0);
    assert_eq!(summary.done, 1);
}

#[test]
fn test_summary_groups_claimants() {
    let temp = TempDir::new().unwrap();
    let mut table = open(&temp);

    {
        let mut view = table.view().unwrap();
        view.grow_to(5).unwrap();
        view.claim(0, WorkerId(2)).unwrap();
        view.claim(1, WorkerId(2)).unwrap();
        view.claim(2, WorkerId(9)).unwrap();
    }

    let summary = table.summary().unwrap();
    assert_eq!(summary.claimed, 3);
    assert_eq!(summary.claimants.get(&WorkerId(2)), Some(&2));
    assert_eq!(summary.claimants.get(&WorkerId(9)), Some(&1));
}

#[test]
fn test_view_is_exclusive() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("done");
    let mut first = StatusTable::open(&path, SlotFormat::default()).unwrap();
    let mut second = StatusTable::open(&path, SlotFormat::default()).unwrap();

    let view = first.view().unwrap();
    assert!(second.try_view().unwrap().is_none());
    drop(view);
    assert!(second.try_view().unwrap().is_some());
}

#[test]
fn test_wider_slots() {
    let temp = TempDir::new().unwrap();
    let format = SlotFormat::new(4, 0x7E).unwrap();
    let mut table = StatusTable::open(temp.path().join("done"), format).unwrap();

    let mut view = table.view().unwrap();
    view.grow_to(2).unwrap();
    view.claim(1, WorkerId(0x01020304)).unwrap();

    assert_eq!(view.state(1), Some(SlotState::Claimed(WorkerId(0x01020304))));
    assert_eq!(positions(view.scan_free(5)), vec![0]);
}
