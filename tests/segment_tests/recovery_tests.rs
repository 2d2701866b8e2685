//! Tests for segment replay
//!
//! These tests verify:
//! - Sets and deletes are applied in log order with their offsets
//! - A partially written tail record is treated as end of data
//! - Corruption (checksum, magic, opcode, length) aborts replay

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use segkv::segment::{encode, replay_segment, segment_path, Record, ReplaySink, ReplayStats, MAGIC};
use segkv::KvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Sink that records the resulting state plus the order of operations
#[derive(Default)]
struct MapSink {
    values: HashMap<String, (Bytes, u64, u64)>,
    ops: Vec<String>,
}

impl ReplaySink for MapSink {
    fn apply_set(&mut self, key: String, value: Bytes, segment_id: u64, offset: u64) {
        self.ops.push(format!("set {}", key));
        self.values.insert(key, (value, segment_id, offset));
    }

    fn apply_delete(&mut self, key: &str) {
        self.ops.push(format!("delete {}", key));
        self.values.remove(key);
    }
}

fn write_segment(dir: &Path, id: u64, records: &[Record]) -> PathBuf {
    let path = segment_path(dir, id);
    let mut file = File::create(&path).unwrap();
    for record in records {
        file.write_all(&encode(record).unwrap()).unwrap();
    }
    file.sync_all().unwrap();
    path
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

// =============================================================================
// Clean Replay Tests
// =============================================================================

#[test]
fn test_replay_empty_segment() {
    let temp = TempDir::new().unwrap();
    let path = write_segment(temp.path(), 1, &[]);
    let mut sink = MapSink::default();

    let stats = replay_segment(&path, 1, &mut sink).unwrap();

    assert_eq!(stats, ReplayStats::default());
    assert!(sink.values.is_empty());
}

#[test]
fn test_replay_applies_in_order() {
    let temp = TempDir::new().unwrap();
    let records = vec![
        Record::set("a", b"1".to_vec()),
        Record::set("b", b"x".to_vec()),
        Record::set("a", b"2".to_vec()),
        Record::delete("b"),
        Record::delete("never-existed"),
    ];
    let path = write_segment(temp.path(), 7, &records);
    let mut sink = MapSink::default();

    let stats = replay_segment(&path, 7, &mut sink).unwrap();

    assert_eq!(stats.records_applied, 5);
    assert_eq!(stats.sets, 3);
    assert_eq!(stats.deletes, 2);
    assert!(!stats.truncated_tail);
    assert_eq!(
        sink.ops,
        vec!["set a", "set b", "set a", "delete b", "delete never-existed"]
    );

    // "a" points at its latest Set, the third record
    let expected_offset = (records[0].encoded_len() + records[1].encoded_len()) as u64;
    let (value, segment_id, offset) = &sink.values["a"];
    assert_eq!(&value[..], b"2");
    assert_eq!(*segment_id, 7);
    assert_eq!(*offset, expected_offset);
    assert!(!sink.values.contains_key("b"));
}

#[test]
fn test_replay_stats_merge() {
    let mut total = ReplayStats::default();
    total.merge(ReplayStats {
        records_applied: 3,
        sets: 2,
        deletes: 1,
        truncated_tail: false,
    });
    total.merge(ReplayStats {
        records_applied: 1,
        sets: 1,
        deletes: 0,
        truncated_tail: true,
    });

    assert_eq!(total.records_applied, 4);
    assert_eq!(total.sets, 3);
    assert_eq!(total.deletes, 1);
    assert!(total.truncated_tail);
}

// =============================================================================
// Partial Tail Tests
// =============================================================================

#[test]
fn test_replay_ignores_partial_tail_record() {
    let temp = TempDir::new().unwrap();
    let path = write_segment(
        temp.path(),
        1,
        &[Record::set("a", b"1".to_vec()), Record::set("b", b"2".to_vec())],
    );

    // Half of a third record, as if the process died mid-write
    let partial = encode(&Record::set("c", b"3".to_vec())).unwrap();
    append_raw(&path, &partial[..partial.len() / 2]);

    let mut sink = MapSink::default();
    let stats = replay_segment(&path, 1, &mut sink).unwrap();

    assert!(stats.truncated_tail);
    assert_eq!(stats.records_applied, 2);
    assert!(sink.values.contains_key("a"));
    assert!(sink.values.contains_key("b"));
    assert!(!sink.values.contains_key("c"));
}

#[test]
fn test_replay_ignores_lone_magic_byte() {
    let temp = TempDir::new().unwrap();
    let path = write_segment(temp.path(), 1, &[Record::set("a", b"1".to_vec())]);
    append_raw(&path, &MAGIC[..1]);

    let mut sink = MapSink::default();
    let stats = replay_segment(&path, 1, &mut sink).unwrap();

    assert!(stats.truncated_tail);
    assert_eq!(stats.records_applied, 1);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_replay_aborts_on_checksum_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = segment_path(temp.path(), 1);

    let good = encode(&Record::set("a", b"1".to_vec())).unwrap();
    let mut bad = encode(&Record::set("b", b"2".to_vec())).unwrap();
    let value_pos = bad.len() - 5;
    bad[value_pos] ^= 0xFF;

    let mut file = File::create(&path).unwrap();
    file.write_all(&good).unwrap();
    file.write_all(&bad).unwrap();
    file.write_all(&good).unwrap();
    drop(file);

    let mut sink = MapSink::default();
    let err = replay_segment(&path, 1, &mut sink).unwrap_err();

    assert!(matches!(err, KvError::ChecksumMismatch { .. }));
    assert!(err.is_corruption());
}

#[test]
fn test_replay_aborts_on_invalid_magic() {
    let temp = TempDir::new().unwrap();
    let path = write_segment(temp.path(), 1, &[Record::set("a", b"1".to_vec())]);
    append_raw(&path, b"garbage that is not a record");

    let mut sink = MapSink::default();
    let err = replay_segment(&path, 1, &mut sink).unwrap_err();

    assert!(matches!(err, KvError::InvalidMagic));
}

#[test]
fn test_replay_aborts_on_unknown_opcode() {
    let temp = TempDir::new().unwrap();
    let path = segment_path(temp.path(), 1);

    let key = b"k";
    let mut body = vec![0x09];
    body.extend_from_slice(&(key.len() as u32).to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(key);
    let crc = crc32fast::hash(&body);

    let mut file = File::create(&path).unwrap();
    file.write_all(&MAGIC).unwrap();
    file.write_all(&body).unwrap();
    file.write_all(&crc.to_le_bytes()).unwrap();
    drop(file);

    let mut sink = MapSink::default();
    let err = replay_segment(&path, 1, &mut sink).unwrap_err();

    assert!(matches!(err, KvError::InvalidOpcode(0x09)));
}

#[test]
fn test_replay_aborts_on_corrupt_length_mid_segment() {
    let temp = TempDir::new().unwrap();
    let path = write_segment(
        temp.path(),
        1,
        &[
            Record::set("a", b"1".to_vec()),
            Record::set("b", b"2".to_vec()),
            Record::set("c", b"3".to_vec()),
        ],
    );

    // High byte of the first record's key_len: its frame now runs past EOF
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[6] = 0x7F;
    std::fs::write(&path, bytes).unwrap();

    let mut sink = MapSink::default();
    let err = replay_segment(&path, 1, &mut sink).unwrap_err();

    assert!(matches!(err, KvError::Corrupted(_)));
    assert!(err.is_corruption());
    assert!(sink.values.is_empty());
}

#[test]
fn test_replay_aborts_on_corrupt_value_len_of_middle_record() {
    let temp = TempDir::new().unwrap();
    let first = Record::set("a", b"1".to_vec());
    let path = write_segment(
        temp.path(),
        1,
        &[
            first.clone(),
            Record::set("b", b"2".to_vec()),
            Record::set("c", b"3".to_vec()),
        ],
    );

    // Second record's value_len grows from 1 to 1 + 2^16
    let value_len_high = first.encoded_len() + 9;
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[value_len_high] = 0x01;
    std::fs::write(&path, bytes).unwrap();

    let mut sink = MapSink::default();
    let err = replay_segment(&path, 1, &mut sink).unwrap_err();

    assert!(matches!(err, KvError::Corrupted(_)));
    // Records before the damage were applied before replay stopped
    assert!(sink.values.contains_key("a"));
}

#[test]
fn test_replay_partial_tail_after_many_records() {
    let temp = TempDir::new().unwrap();
    let records: Vec<Record> = (0..50)
        .map(|i| Record::set(format!("key{}", i), format!("value{}", i).into_bytes()))
        .collect();
    let path = write_segment(temp.path(), 1, &records);

    // Every cut point of a trailing record is still a torn write
    let full = encode(&Record::set("last", b"value".to_vec())).unwrap();
    let base = std::fs::read(&path).unwrap();
    for cut in 1..full.len() {
        let mut bytes = base.clone();
        bytes.extend_from_slice(&full[..cut]);
        std::fs::write(&path, &bytes).unwrap();

        let mut sink = MapSink::default();
        let stats = replay_segment(&path, 1, &mut sink).unwrap();

        assert!(stats.truncated_tail, "cut at {}", cut);
        assert_eq!(stats.records_applied, 50);
    }
}
