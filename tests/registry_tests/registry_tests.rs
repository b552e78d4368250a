//! Tests for FileStorage
//!
//! These tests verify:
//! - Save/read round trips across chunk and data file boundaries
//! - Durability across close and reopen
//! - Duplicate names are rejected, including under concurrency
//! - Partition limits and bad partition ids
//! - Recovery from a torn metadata log
//! - Non-streaming command execution

use std::fs::OpenOptions;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::thread;

use fse::metadata::FileInfo;
use fse::protocol::Command;
use fse::storage::{PartitionId, MAX_PARTITION_NUM};
use fse::{Config, File, FileStorage, FseError};
use tempfile::TempDir;

const CHUNK_SIZE: u32 = 16;
const MAX_CHUNKS: u32 = 4;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(dir: &TempDir) -> Config {
    Config::builder()
        .storage_path(dir.path().join("store"))
        .max_chunk_data_size(CHUNK_SIZE)
        .max_chunks_per_file(MAX_CHUNKS)
        .cache_capacity(8)
        .build()
}

fn setup_temp_storage() -> (TempDir, FileStorage) {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileStorage::open(test_config(&temp_dir)).unwrap();
    (temp_dir, storage)
}

fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

fn read_all(storage: &FileStorage, name: &str) -> Vec<u8> {
    let file = storage.lookup(name).unwrap();
    let mut data = Vec::new();
    storage.open_stream(&file).read_to_end(&mut data).unwrap();
    data
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_empty_storage() {
    let (temp, storage) = setup_temp_storage();

    assert_eq!(storage.file_count(), 0);
    assert_eq!(storage.data_file_count(), 0);
    assert!(storage.list().is_empty());
    assert!(temp.path().join("store").join("datafiles").is_dir());
    assert_eq!(storage.metadata_path(), storage.storage_path().join("metadata.esf"));
}

#[test]
fn test_open_rejects_invalid_config() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .storage_path(temp.path())
        .max_chunk_data_size(0)
        .build();

    assert!(matches!(FileStorage::open(config), Err(FseError::Config(_))));
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_boundary_lengths() {
    let (_temp, storage) = setup_temp_storage();
    let chunk = CHUNK_SIZE as usize;

    let cases = [
        (0, 0),
        (1, 1),
        (chunk - 1, 1),
        (chunk, 1),
        (chunk + 1, 2),
        (chunk * 5 + 3, 6),
    ];

    for (i, &(len, expected_partitions)) in cases.iter().enumerate() {
        let name = format!("file-{}", i);
        let data = payload(len, i as u8);

        let file = storage.save_file(&name, "application/octet-stream", &data[..]).unwrap();

        assert_eq!(file.size() as usize, len);
        assert_eq!(file.partitions().len(), expected_partitions, "length {}", len);
        assert_eq!(read_all(&storage, &name), data, "length {}", len);
    }
}

#[test]
fn test_file_spans_data_files() {
    let (_temp, storage) = setup_temp_storage();
    let data = payload(CHUNK_SIZE as usize * 10, 7);

    let file = storage.save_file("spanning", "", Cursor::new(&data)).unwrap();

    let file_ids: Vec<u16> = file.partitions().iter().map(|p| p.file_id()).collect();
    assert_eq!(file_ids, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
    assert_eq!(storage.data_file_count(), 3);
    assert_eq!(read_all(&storage, "spanning"), data);
}

#[test]
fn test_files_share_data_files() {
    let (_temp, storage) = setup_temp_storage();

    let a = storage.save_file("a", "", &b"aaaa"[..]).unwrap();
    let b = storage.save_file("b", "", &b"bbbb"[..]).unwrap();

    assert_eq!(a.partitions(), &[PartitionId::new(0, 0)]);
    assert_eq!(b.partitions(), &[PartitionId::new(0, 1)]);
    assert_eq!(read_all(&storage, "a"), b"aaaa");
    assert_eq!(read_all(&storage, "b"), b"bbbb");
}

#[test]
fn test_metadata_is_recorded() {
    let (_temp, storage) = setup_temp_storage();

    let saved = storage.save_file("doc.txt", "text/plain", &b"hello"[..]).unwrap();
    let found = storage.lookup("doc.txt").unwrap();

    assert_eq!(found.name(), "doc.txt");
    assert_eq!(found.content_type(), "text/plain");
    assert_eq!(found.size(), 5);
    assert_eq!(found.created_at(), saved.created_at());
    assert!(storage.lookup("other").is_none());
}

#[test]
fn test_list_is_ordered_by_name() {
    let (_temp, storage) = setup_temp_storage();
    for name in ["zeta", "alpha", "mid"] {
        storage.save_file(name, "", &b"x"[..]).unwrap();
    }

    let names: Vec<String> = storage.list().iter().map(|f| f.name().to_string()).collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_duplicate_name_rejected() {
    let (_temp, storage) = setup_temp_storage();
    storage.save_file("dup", "", &b"original"[..]).unwrap();

    let result = storage.save_file("dup", "", &b"replacement"[..]);

    assert!(matches!(result, Err(FseError::DuplicateFileName(ref n)) if n == "dup"));
    assert_eq!(read_all(&storage, "dup"), b"original");
    assert_eq!(storage.file_count(), 1);
}

#[test]
fn test_invalid_name_writes_nothing() {
    let (_temp, storage) = setup_temp_storage();

    let result = storage.save_file("", "", &b"data"[..]);

    assert!(matches!(result, Err(FseError::InvalidOperation(_))));
    assert_eq!(storage.data_file_count(), 0);
}

#[test]
fn test_partition_limit() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .storage_path(temp.path())
        .max_chunk_data_size(1)
        .max_chunks_per_file(1 << 16)
        .cache_capacity(0)
        .build();
    let storage = FileStorage::open(config).unwrap();

    let at_limit = vec![1u8; MAX_PARTITION_NUM];
    let file = storage.save_file("at-limit", "", &at_limit[..]).unwrap();
    assert_eq!(file.partitions().len(), MAX_PARTITION_NUM);

    let over_limit = vec![2u8; MAX_PARTITION_NUM + 1];
    let result = storage.save_file("over-limit", "", &over_limit[..]);
    assert!(matches!(
        result,
        Err(FseError::PartitionNumLimit { limit }) if limit == MAX_PARTITION_NUM
    ));
    assert!(storage.lookup("over-limit").is_none());
}

// =============================================================================
// Chunk Access Tests
// =============================================================================

#[test]
fn test_get_chunk_unknown_data_file() {
    let (_temp, storage) = setup_temp_storage();
    let id = PartitionId::new(9, 0);

    assert!(matches!(
        storage.get_chunk(id),
        Err(FseError::InvalidPartitionId(bad)) if bad == id
    ));
}

#[test]
fn test_get_chunk_unwritten_slot() {
    let (_temp, storage) = setup_temp_storage();
    storage.save_file("one", "", &b"1"[..]).unwrap();

    assert!(matches!(
        storage.get_chunk(PartitionId::new(0, 3)),
        Err(FseError::InvalidChunkId {
            file_id: 0,
            chunk_id: 3
        })
    ));
}

#[test]
fn test_reads_populate_cache() {
    let (_temp, storage) = setup_temp_storage();
    let file = storage.save_file("cached", "", &payload(40, 1)[..]).unwrap();

    read_all(&storage, "cached");
    for id in file.partitions() {
        assert!(storage.cache().contains(*id));
    }

    let before = storage.cache().stats().hits;
    read_all(&storage, "cached");
    assert_eq!(storage.cache().stats().hits, before + 3);
}

// =============================================================================
// Two-Phase Ingest Tests
// =============================================================================

#[test]
fn test_save_data_then_register() {
    let (_temp, storage) = setup_temp_storage();
    let data = payload(20, 3);

    let partitions = storage.save_file_data(&data[..]).unwrap();
    assert_eq!(partitions.len(), 2);
    assert_eq!(storage.file_count(), 0);

    let file = File::new("late", "", data.len() as u32, partitions.clone()).unwrap();
    storage.register_file(file).unwrap();
    assert_eq!(read_all(&storage, "late"), data);

    let again = File::new("late", "", data.len() as u32, partitions).unwrap();
    assert!(matches!(
        storage.register_file(again),
        Err(FseError::DuplicateFileName(_))
    ));
}

// =============================================================================
// Durability Tests
// =============================================================================

#[test]
fn test_files_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let data = payload(CHUNK_SIZE as usize * 6 + 5, 9);
    {
        let storage = FileStorage::open(test_config(&temp)).unwrap();
        storage.save_file("big", "bin", &data[..]).unwrap();
        storage.save_file("small", "txt", &b"tiny"[..]).unwrap();
        storage.close().unwrap();
    }

    let storage = FileStorage::open(test_config(&temp)).unwrap();
    assert_eq!(storage.file_count(), 2);
    assert_eq!(storage.lookup("big").unwrap().content_type(), "bin");
    assert_eq!(read_all(&storage, "big"), data);
    assert_eq!(read_all(&storage, "small"), b"tiny");

    // "big" and "small" filled data files 0 and 1
    let next = storage.save_file("next", "", &b"n"[..]).unwrap();
    assert_eq!(next.partitions(), &[PartitionId::new(2, 0)]);
}

#[test]
fn test_torn_metadata_tail_is_dropped_and_appendable() {
    let temp = TempDir::new().unwrap();
    let metadata_path = {
        let storage = FileStorage::open(test_config(&temp)).unwrap();
        storage.save_file("kept", "", &b"kept"[..]).unwrap();
        storage.metadata_path()
    };

    // An interrupted append left half an entry behind
    let mut raw = OpenOptions::new().append(true).open(&metadata_path).unwrap();
    raw.write_all(&[0, 0, 0, 40, b'l', b'o', b's']).unwrap();
    drop(raw);

    {
        let storage = FileStorage::open(test_config(&temp)).unwrap();
        assert_eq!(storage.file_count(), 1);
        storage.save_file("after", "", &b"after"[..]).unwrap();
    }

    let storage = FileStorage::open(test_config(&temp)).unwrap();
    assert_eq!(storage.file_count(), 2);
    assert_eq!(read_all(&storage, "kept"), b"kept");
    assert_eq!(read_all(&storage, "after"), b"after");
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_saves() {
    let (_temp, storage) = setup_temp_storage();
    let storage = Arc::new(storage);

    let handles: Vec<_> = (0..8u8)
        .map(|t| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                for i in 0..5u8 {
                    let data = payload(CHUNK_SIZE as usize * 2 + t as usize, t ^ i);
                    storage
                        .save_file(&format!("t{}-{}", t, i), "", &data[..])
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(storage.file_count(), 40);
    for t in 0..8u8 {
        for i in 0..5u8 {
            let expected = payload(CHUNK_SIZE as usize * 2 + t as usize, t ^ i);
            assert_eq!(read_all(&storage, &format!("t{}-{}", t, i)), expected);
        }
    }
}

#[test]
fn test_concurrent_same_name_single_winner() {
    let (_temp, storage) = setup_temp_storage();
    let storage = Arc::new(storage);

    let handles: Vec<_> = (0..8u8)
        .map(|t| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || storage.save_file("contested", "", &[t; 4][..]).is_ok())
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(winners, 1);
    assert_eq!(storage.file_count(), 1);
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_execute_stat() {
    let (_temp, storage) = setup_temp_storage();
    storage.save_file("s", "text/plain", &b"12345"[..]).unwrap();

    let payload = storage
        .execute(Command::Stat {
            name: "s".to_string(),
        })
        .unwrap()
        .unwrap();
    let info: FileInfo = bincode::deserialize(&payload).unwrap();

    assert_eq!(info.name, "s");
    assert_eq!(info.size, 5);
    assert_eq!(info.partition_count, 1);

    let missing = storage.execute(Command::Stat {
        name: "nope".to_string(),
    });
    assert!(matches!(missing, Err(FseError::FileNotFound(_))));
}

#[test]
fn test_execute_list_and_ping() {
    let (_temp, storage) = setup_temp_storage();
    storage.save_file("b", "", &b"b"[..]).unwrap();
    storage.save_file("a", "", &b"a"[..]).unwrap();

    let payload = storage.execute(Command::List).unwrap().unwrap();
    let infos: Vec<FileInfo> = bincode::deserialize(&payload).unwrap();
    let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);

    assert_eq!(storage.execute(Command::Ping).unwrap().unwrap(), b"PONG");
}

#[test]
fn test_execute_rejects_streaming_commands() {
    let (_temp, storage) = setup_temp_storage();

    let result = storage.execute(Command::Get {
        name: "x".to_string(),
    });
    assert!(matches!(result, Err(FseError::InvalidOperation(_))));
}
