//! Tests for ESF Reader
//!
//! These tests verify:
//! - Reading entries written by the writer, in order
//! - Torn final entries end the stream instead of failing it
//! - Oversized length prefixes are reported as corruption
//! - Position tracks the end of the last complete entry

use std::fs::OpenOptions;
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

fn write_entries(path: &PathBuf, entries: &[&[u8]]) {
    let mut writer = EntryWriter::open(path, 0, SyncStrategy::EveryGroup).unwrap();
    for entry in entries {
        writer.append_entry(entry).unwrap();
    }
}

fn append_raw(path: &PathBuf, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

// =============================================================================
// Basic Reading Tests
// =============================================================================

#[test]
fn test_read_empty_file() {
    let (_temp, path) = setup_temp_log();
    write_entries(&path, &[]);

    let mut reader = EntryReader::open(&path).unwrap();
    assert!(reader.read_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
    assert!(!reader.is_truncated());
}

#[test]
fn test_read_entries_in_order() {
    let (_temp, path) = setup_temp_log();
    write_entries(&path, &[b"first", b"", b"third"]);

    let mut reader = EntryReader::open(&path).unwrap();
    assert_eq!(reader.read_entry().unwrap().unwrap(), b"first");
    assert_eq!(reader.read_entry().unwrap().unwrap(), b"");
    assert_eq!(reader.read_entry().unwrap().unwrap(), b"third");
    assert!(reader.read_entry().unwrap().is_none());

    let expected = 3 * LENGTH_PREFIX_SIZE + 5 + 0 + 5;
    assert_eq!(reader.position(), expected as u64);
}

#[test]
fn test_iterator_yields_all_entries() {
    let (_temp, path) = setup_temp_log();
    write_entries(&path, &[b"a", b"bb", b"ccc"]);

    let entries: Vec<Vec<u8>> = EntryReader::open(&path)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries, vec![b"a".to_vec(), b"bb".to_vec(), b"ccc".to_vec()]);
}

#[test]
fn test_open_missing_file_fails() {
    let (_temp, path) = setup_temp_log();
    assert!(matches!(EntryReader::open(&path), Err(FseError::Io(_))));
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_torn_length_prefix_ends_stream() {
    let (_temp, path) = setup_temp_log();
    write_entries(&path, &[b"complete"]);
    append_raw(&path, &[0x00, 0x00]);

    let mut reader = EntryReader::open(&path).unwrap();
    assert_eq!(reader.read_entry().unwrap().unwrap(), b"complete");
    assert!(reader.read_entry().unwrap().is_none());
    assert!(reader.is_truncated());
    assert_eq!(reader.position(), (LENGTH_PREFIX_SIZE + 8) as u64);
}

#[test]
fn test_torn_payload_ends_stream() {
    let (_temp, path) = setup_temp_log();
    write_entries(&path, &[b"complete"]);
    // Declares 10 bytes, only 3 follow
    append_raw(&path, &[0, 0, 0, 10, b'a', b'b', b'c']);

    let mut reader = EntryReader::open(&path).unwrap();
    assert!(reader.read_entry().unwrap().is_some());
    assert!(reader.read_entry().unwrap().is_none());
    assert!(reader.is_truncated());

    // Stays at end once truncated
    assert!(reader.read_entry().unwrap().is_none());
}

#[test]
fn test_huge_prefix_without_data_is_torn() {
    let (_temp, path) = setup_temp_log();
    write_entries(&path, &[]);
    append_raw(&path, &[0xff, 0xff, 0xff, 0xff, 1, 2, 3]);

    let mut reader = EntryReader::open(&path).unwrap();
    assert!(reader.read_entry().unwrap().is_none());
    assert!(reader.is_truncated());
}

#[test]
fn test_oversized_prefix_with_data_is_corruption() {
    let (_temp, path) = setup_temp_log();
    write_entries(&path, &[]);

    let mut raw = (MAX_ENTRY_SIZE + 1).to_be_bytes().to_vec();
    raw.resize(LENGTH_PREFIX_SIZE + MAX_ENTRY_SIZE as usize + 1, 0);
    append_raw(&path, &raw);

    let mut reader = EntryReader::open(&path).unwrap();
    assert!(matches!(reader.read_entry(), Err(FseError::Corruption(_))));
}
