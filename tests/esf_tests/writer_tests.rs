//! Tests for ESF Writer
//!
//! These tests verify:
//! - Appending single entries and groups
//! - Sync strategies (EveryGroup, EveryNGroups)
//! - Oversized entries are rejected before anything is written
//! - A failed group leaves the length and sync counter untouched
//! - Reopening cuts a torn tail and appends after the last valid entry

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use fse::config::SyncStrategy;
use fse::esf::{EntryReader, EntryWriter, LENGTH_PREFIX_SIZE, MAX_ENTRY_SIZE};
use fse::FseError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.esf");
    (temp_dir, path)
}

fn read_all(path: &PathBuf) -> Vec<Vec<u8>> {
    EntryReader::open(path)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

// =============================================================================
// Basic Writing Tests
// =============================================================================

#[test]
fn test_open_creates_file() {
    let (_temp, path) = setup_temp_log();
    let writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();

    assert!(path.exists());
    assert!(writer.is_empty());
    assert_eq!(writer.path(), path.as_path());
}

#[test]
fn test_append_entry_updates_len() {
    let (_temp, path) = setup_temp_log();
    let mut writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();

    writer.append_entry(b"hello").unwrap();
    assert_eq!(writer.len(), (LENGTH_PREFIX_SIZE + 5) as u64);

    writer.append_entry(b"").unwrap();
    assert_eq!(writer.len(), (2 * LENGTH_PREFIX_SIZE + 5) as u64);
    assert_eq!(fs::metadata(&path).unwrap().len(), writer.len());
}

#[test]
fn test_append_group_writes_all_entries() {
    let (_temp, path) = setup_temp_log();
    {
        let mut writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();
        writer
            .append_group(&[b"one".to_vec(), b"two".to_vec(), b"three".to_vec()])
            .unwrap();
    }

    assert_eq!(
        read_all(&path),
        vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
    );
}

#[test]
fn test_length_prefix_is_big_endian() {
    let (_temp, path) = setup_temp_log();
    {
        let mut writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();
        writer.append_entry(&[7u8; 258]).unwrap();
    }

    let raw = fs::read(&path).unwrap();
    assert_eq!(&raw[..4], &[0, 0, 1, 2]);
    assert_eq!(raw.len(), 4 + 258);
}

#[test]
fn test_oversized_entry_rejected_without_write() {
    let (_temp, path) = setup_temp_log();
    let mut writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();

    let big = vec![0u8; MAX_ENTRY_SIZE as usize + 1];
    let result = writer.append_group(&[b"small".to_vec(), big]);

    assert!(matches!(
        result,
        Err(FseError::EntryTooLarge { size, max }) if size == MAX_ENTRY_SIZE as usize + 1 && max == MAX_ENTRY_SIZE
    ));
    assert!(writer.is_empty());
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_every_group_syncs_immediately() {
    let (_temp, path) = setup_temp_log();
    let mut writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();

    writer.append_group(&[b"a", b"b"]).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_every_n_groups_batches_syncs() {
    let (_temp, path) = setup_temp_log();
    let mut writer =
        EntryWriter::open(&path, 0, SyncStrategy::EveryNGroups { count: 3 }).unwrap();

    writer.append_entry(b"1").unwrap();
    assert_eq!(writer.uncommitted_count(), 1);
    writer.append_entry(b"2").unwrap();
    assert_eq!(writer.uncommitted_count(), 2);
    writer.append_entry(b"3").unwrap();
    assert_eq!(writer.uncommitted_count(), 0);

    writer.append_entry(b"4").unwrap();
    writer.sync().unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[cfg(target_os = "linux")]
#[test]
fn test_failed_group_is_not_counted() {
    // Every write to /dev/full fails with ENOSPC
    let path = PathBuf::from("/dev/full");
    let mut writer =
        EntryWriter::open(&path, 0, SyncStrategy::EveryNGroups { count: 4 }).unwrap();

    for _ in 0..2 {
        assert!(matches!(
            writer.append_group(&[b"name", b"size"]),
            Err(FseError::Io(_))
        ));
        assert_eq!(writer.len(), 0);
        assert_eq!(writer.uncommitted_count(), 0);
    }
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_reopen_appends_after_existing_entries() {
    let (_temp, path) = setup_temp_log();
    let len = {
        let mut writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();
        writer.append_entry(b"before").unwrap();
        writer.len()
    };

    {
        let mut writer = EntryWriter::open(&path, len, SyncStrategy::EveryGroup).unwrap();
        assert_eq!(writer.len(), len);
        writer.append_entry(b"after").unwrap();
    }

    assert_eq!(read_all(&path), vec![b"before".to_vec(), b"after".to_vec()]);
}

#[test]
fn test_reopen_truncates_torn_tail() {
    let (_temp, path) = setup_temp_log();
    let valid_len = {
        let mut writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();
        writer.append_entry(b"kept").unwrap();
        writer.len()
    };

    // Half-written entry from an interrupted append
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0, 0, 0, 50, 1, 2, 3]).unwrap();
    drop(file);

    {
        let mut writer = EntryWriter::open(&path, valid_len, SyncStrategy::EveryGroup).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), valid_len);
        writer.append_entry(b"next").unwrap();
    }

    assert_eq!(read_all(&path), vec![b"kept".to_vec(), b"next".to_vec()]);
}
