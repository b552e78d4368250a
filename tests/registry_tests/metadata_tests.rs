//! Tests for file metadata records and log replay
//!
//! These tests verify:
//! - Entry group layout of a file record
//! - Replay returns complete groups in append order
//! - A group cut short by a crash is dropped, not reported as an error
//! - Malformed entries are reported as corruption
//! - Name / content type / partition count validation

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use fse::config::SyncStrategy;
use fse::esf::EntryWriter;
use fse::metadata::{
    self, File, FileInfo, GROUP_HEADER_ENTRIES, MAX_CONTENT_TYPE_LEN, MAX_FILE_NAME_LEN,
};
use fse::storage::{PartitionId, MAX_PARTITION_NUM};
use fse::FseError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("metadata.esf");
    (temp_dir, path)
}

fn sample_file(name: &str, partitions: &[(u16, u16)]) -> File {
    let partitions = partitions
        .iter()
        .map(|&(f, c)| PartitionId::new(f, c))
        .collect();
    File::from_parts(name, 1234, "text/plain", 1_700_000_000_123, partitions).unwrap()
}

fn write_files(path: &PathBuf, files: &[File]) -> u64 {
    let mut writer = EntryWriter::open(path, 0, SyncStrategy::EveryGroup).unwrap();
    for file in files {
        writer.append_group(&file.to_entries()).unwrap();
    }
    writer.len()
}

// =============================================================================
// Entry Group Tests
// =============================================================================

#[test]
fn test_entry_group_layout() {
    let file = sample_file("a.txt", &[(0, 1), (2, 3)]);
    let entries = file.to_entries();

    assert_eq!(entries.len(), GROUP_HEADER_ENTRIES + 2);
    assert_eq!(entries[0], b"a.txt");
    assert_eq!(entries[1], 1234u32.to_be_bytes());
    assert_eq!(entries[2], b"text/plain");
    assert_eq!(entries[3], 1_700_000_000_123i64.to_be_bytes());
    assert_eq!(entries[4], 2u16.to_be_bytes());
    assert_eq!(entries[5], 0x0000_0001u32.to_be_bytes());
    assert_eq!(entries[6], 0x0002_0003u32.to_be_bytes());
}

#[test]
fn test_new_stamps_creation_time() {
    let file = File::new("now", "", 0, Vec::new()).unwrap();
    assert!(file.created_at() > 1_600_000_000_000);
    assert!(file.partitions().is_empty());
}

#[test]
fn test_file_info_summary() {
    let file = sample_file("info", &[(0, 0), (0, 1), (0, 2)]);
    let info = FileInfo::from(&file);

    assert_eq!(info.name, "info");
    assert_eq!(info.size, 1234);
    assert_eq!(info.content_type, "text/plain");
    assert_eq!(info.created_at, 1_700_000_000_123);
    assert_eq!(info.partition_count, 3);
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_replay_missing_log_is_empty() {
    let (_temp, path) = setup_temp_log();

    let result = metadata::replay(&path).unwrap();

    assert!(result.files.is_empty());
    assert_eq!(result.valid_len, 0);
    assert!(!result.dropped_tail);
}

#[test]
fn test_replay_returns_files_in_order() {
    let (_temp, path) = setup_temp_log();
    let files = vec![
        sample_file("first", &[(0, 0)]),
        sample_file("empty", &[]),
        sample_file("third", &[(0, 1), (1, 0)]),
    ];
    let len = write_files(&path, &files);

    let result = metadata::replay(&path).unwrap();

    assert_eq!(result.files, files);
    assert_eq!(result.valid_len, len);
    assert!(!result.dropped_tail);
}

#[test]
fn test_replay_drops_incomplete_group() {
    let (_temp, path) = setup_temp_log();
    let complete = sample_file("complete", &[(0, 0)]);
    let valid_len = write_files(&path, &[complete.clone()]);

    // Only the first three entries of the next group reached the disk
    let partial = sample_file("partial", &[(0, 1), (0, 2)]);
    {
        let mut writer = EntryWriter::open(&path, valid_len, SyncStrategy::EveryGroup).unwrap();
        writer.append_group(&partial.to_entries()[..3]).unwrap();
    }

    let result = metadata::replay(&path).unwrap();

    assert_eq!(result.files, vec![complete]);
    assert_eq!(result.valid_len, valid_len);
    assert!(result.dropped_tail);
}

#[test]
fn test_replay_drops_group_missing_partitions() {
    let (_temp, path) = setup_temp_log();
    let file = sample_file("short", &[(0, 0), (0, 1), (0, 2)]);
    {
        let mut writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();
        let entries = file.to_entries();
        writer.append_group(&entries[..entries.len() - 1]).unwrap();
    }

    let result = metadata::replay(&path).unwrap();

    assert!(result.files.is_empty());
    assert_eq!(result.valid_len, 0);
    assert!(result.dropped_tail);
}

#[test]
fn test_replay_drops_torn_entry() {
    let (_temp, path) = setup_temp_log();
    let valid_len = write_files(&path, &[sample_file("kept", &[])]);

    let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
    raw.write_all(&[0, 0, 0, 9, b'h', b'a']).unwrap();
    drop(raw);

    let result = metadata::replay(&path).unwrap();

    assert_eq!(result.files.len(), 1);
    assert_eq!(result.valid_len, valid_len);
    assert!(result.dropped_tail);
}

#[test]
fn test_replay_rejects_bad_field_width() {
    let (_temp, path) = setup_temp_log();
    {
        let mut writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();
        let entries: [&[u8]; 5] = [b"name", b"\x00\x01", b"", &[0u8; 8], &[0u8; 2]];
        writer.append_group(&entries).unwrap();
    }

    assert!(matches!(metadata::replay(&path), Err(FseError::Corruption(_))));
}

#[test]
fn test_replay_rejects_invalid_utf8_name() {
    let (_temp, path) = setup_temp_log();
    {
        let mut writer = EntryWriter::open(&path, 0, SyncStrategy::EveryGroup).unwrap();
        let size = 0u32.to_be_bytes();
        let entries: [&[u8]; 5] = [&[0xff, 0xfe], &size, b"", &[0u8; 8], &[0u8; 2]];
        writer.append_group(&entries).unwrap();
    }

    assert!(matches!(metadata::replay(&path), Err(FseError::Corruption(_))));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_file_name_bounds() {
    assert!(metadata::validate_file_name("x").is_ok());
    assert!(metadata::validate_file_name(&"n".repeat(MAX_FILE_NAME_LEN)).is_ok());

    assert!(matches!(
        metadata::validate_file_name(""),
        Err(FseError::InvalidOperation(_))
    ));
    assert!(matches!(
        metadata::validate_file_name(&"n".repeat(MAX_FILE_NAME_LEN + 1)),
        Err(FseError::InvalidOperation(_))
    ));
}

#[test]
fn test_content_type_bounds() {
    assert!(metadata::validate_content_type("").is_ok());
    assert!(metadata::validate_content_type(&"t".repeat(MAX_CONTENT_TYPE_LEN)).is_ok());
    assert!(metadata::validate_content_type(&"t".repeat(MAX_CONTENT_TYPE_LEN + 1)).is_err());
}

#[test]
fn test_too_many_partitions_rejected() {
    let partitions = (0..=MAX_PARTITION_NUM as u32)
        .map(PartitionId::from)
        .collect();

    let result = File::from_parts("big", 0, "", 0, partitions);
    assert!(matches!(
        result,
        Err(FseError::PartitionNumLimit { limit }) if limit == MAX_PARTITION_NUM
    ));
}
