//! Tests for segment files, writer and reader
//!
//! These tests verify:
//! - Segment naming and ID parsing
//! - Discovery: ascending order, malformed names skipped
//! - Writer offsets, size tracking, append-mode reopen
//! - Reader iteration with offsets

use std::fs::{self, File};
use std::path::Path;

use segkv::segment::{
    find_segments, parse_segment_id, segment_path, Record, SegmentReader, SegmentWriter,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn touch(dir: &Path, name: &str) {
    File::create(dir.join(name)).unwrap();
}

fn read_all(path: &Path) -> Vec<(u64, Record)> {
    SegmentReader::open(path)
        .unwrap()
        .collect::<segkv::Result<Vec<_>>>()
        .unwrap()
}

// =============================================================================
// Naming Tests
// =============================================================================

#[test]
fn test_segment_path_format() {
    let dir = Path::new("/data");
    assert_eq!(segment_path(dir, 0), dir.join("segment-0.dat"));
    assert_eq!(segment_path(dir, 42), dir.join("segment-42.dat"));
}

#[test]
fn test_parse_segment_id() {
    assert_eq!(parse_segment_id("segment-0.dat"), Some(0));
    assert_eq!(parse_segment_id("segment-42.dat"), Some(42));
    assert_eq!(parse_segment_id("segment-18446744073709551615.dat"), Some(u64::MAX));

    // The engine rebuilds paths from the ID, so only canonical names count
    assert_eq!(parse_segment_id("segment-007.dat"), None);
    assert_eq!(parse_segment_id("segment-+5.dat"), None);
    assert_eq!(parse_segment_id("segment- 5.dat"), None);
    assert_eq!(parse_segment_id("segment-18446744073709551616.dat"), None);
    assert_eq!(parse_segment_id("segment-.dat"), None);
    assert_eq!(parse_segment_id("segment-abc.dat"), None);
    assert_eq!(parse_segment_id("segment--1.dat"), None);
    assert_eq!(parse_segment_id("segment-1.log"), None);
    assert_eq!(parse_segment_id("index.snapshot"), None);
}

// =============================================================================
// Discovery Tests
// =============================================================================

#[test]
fn test_find_segments_empty_dir() {
    let temp = TempDir::new().unwrap();
    assert!(find_segments(temp.path()).unwrap().is_empty());
}

#[test]
fn test_find_segments_sorted_numerically() {
    let temp = TempDir::new().unwrap();
    for id in [10, 2, 1, 100, 0] {
        touch(temp.path(), &format!("segment-{}.dat", id));
    }

    assert_eq!(find_segments(temp.path()).unwrap(), vec![0, 1, 2, 10, 100]);
}

#[test]
fn test_find_segments_skips_unrelated_and_malformed() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), "segment-3.dat");
    touch(temp.path(), "segment-x.dat");
    touch(temp.path(), "segment-+5.dat");
    touch(temp.path(), "segment-03.dat");
    touch(temp.path(), "segment-4.dat.bak");
    touch(temp.path(), "index.snapshot");
    touch(temp.path(), "notes.txt");

    assert_eq!(find_segments(temp.path()).unwrap(), vec![3]);
}

#[test]
fn test_find_segments_missing_dir_has_context() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope");

    let err = find_segments(&missing).unwrap_err();

    assert!(err.to_string().starts_with("find segments: "));
    assert!(matches!(err.root(), segkv::KvError::Io(_)));
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_writer_creates_file_and_tracks_offsets() {
    let temp = TempDir::new().unwrap();
    let mut writer = SegmentWriter::open(temp.path(), 5).unwrap();

    assert_eq!(writer.id(), 5);
    assert_eq!(writer.path(), segment_path(temp.path(), 5));
    assert!(writer.path().exists());
    assert_eq!(writer.size(), 0);

    let first = Record::set("a", b"1".to_vec());
    let second = Record::delete("a");

    assert_eq!(writer.append(&first).unwrap(), 0);
    assert_eq!(
        writer.append(&second).unwrap(),
        first.encoded_len() as u64
    );
    assert_eq!(
        writer.size(),
        (first.encoded_len() + second.encoded_len()) as u64
    );
}

#[test]
fn test_writer_sync_makes_data_visible_on_disk() {
    let temp = TempDir::new().unwrap();
    let mut writer = SegmentWriter::open(temp.path(), 1).unwrap();

    writer.append(&Record::set("k", b"v".to_vec())).unwrap();
    writer.sync().unwrap();

    let on_disk = fs::metadata(writer.path()).unwrap().len();
    assert_eq!(on_disk, writer.size());
}

#[test]
fn test_writer_reopen_appends() {
    let temp = TempDir::new().unwrap();
    let first = Record::set("a", b"1".to_vec());
    let second = Record::set("b", b"2".to_vec());

    {
        let mut writer = SegmentWriter::open(temp.path(), 1).unwrap();
        writer.append(&first).unwrap();
        writer.sync().unwrap();
    }

    let mut writer = SegmentWriter::open(temp.path(), 1).unwrap();
    assert_eq!(writer.size(), first.encoded_len() as u64);
    let offset = writer.append(&second).unwrap();
    writer.sync().unwrap();

    assert_eq!(offset, first.encoded_len() as u64);

    let records = read_all(&segment_path(temp.path(), 1));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].1, first);
    assert_eq!(records[1], (offset, second));
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_empty_segment() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), "segment-1.dat");

    let mut reader = SegmentReader::open(&segment_path(temp.path(), 1)).unwrap();
    assert!(reader.next_record().unwrap().is_none());
    assert_eq!(reader.offset(), 0);
}

#[test]
fn test_reader_yields_offsets_matching_writer() {
    let temp = TempDir::new().unwrap();
    let mut writer = SegmentWriter::open(temp.path(), 1).unwrap();

    let mut expected = Vec::new();
    for i in 0..50 {
        let record = if i % 5 == 4 {
            Record::delete(format!("key{}", i - 1))
        } else {
            Record::set(format!("key{}", i), format!("value{}", i).into_bytes())
        };
        let offset = writer.append(&record).unwrap();
        expected.push((offset, record));
    }
    writer.sync().unwrap();

    let records = read_all(writer.path());
    assert_eq!(records, expected);
}

#[test]
fn test_reader_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = SegmentReader::open(&segment_path(temp.path(), 9)).err().unwrap();
    assert!(matches!(err.root(), segkv::KvError::Io(_)));
}
