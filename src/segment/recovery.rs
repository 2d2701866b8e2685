//! Segment Replay
//!
//! Rebuilds in-memory state by re-applying every record of a segment.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

use crate::error::{KvError, Result};

use super::reader::SegmentReader;
use super::record::{decode, OpCode, MAGIC};

/// Receives the operations found while replaying a segment
pub trait ReplaySink {
    /// A `Set` record for `key` at `(segment_id, offset)`
    fn apply_set(&mut self, key: String, value: Bytes, segment_id: u64, offset: u64);

    /// A `Delete` record for `key`
    fn apply_delete(&mut self, key: &str);
}

/// Counters from replaying one segment
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records applied (sets + deletes)
    pub records_applied: u64,

    pub sets: u64,

    pub deletes: u64,

    /// Whether the segment ended in a partially written record
    pub truncated_tail: bool,
}

impl ReplayStats {
    /// Fold another segment's counters into this one
    pub fn merge(&mut self, other: ReplayStats) {
        self.records_applied += other.records_applied;
        self.sets += other.sets;
        self.deletes += other.deletes;
        self.truncated_tail |= other.truncated_tail;
    }
}

/// Replay every record of one segment into `sink`
///
/// Corruption (bad magic, checksum mismatch, unknown opcode, non-UTF-8 key)
/// aborts replay with that error. A record cut off by end of file is treated
/// as the end of valid data, unless an intact record still follows it: then
/// the cut-off record had a corrupt length field and replay fails with
/// `Corrupted`.
pub fn replay_segment<S: ReplaySink>(
    path: &Path,
    segment_id: u64,
    sink: &mut S,
) -> Result<ReplayStats> {
    let mut reader = SegmentReader::open(path)?;
    let mut stats = ReplayStats::default();

    loop {
        let (offset, record) = match reader.next_record() {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(KvError::Io(ref e)) if e.kind() == ErrorKind::UnexpectedEof => {
                let start = reader.offset();
                if let Some(next) = find_intact_record_after(path, start)? {
                    return Err(KvError::Corrupted(format!(
                        "record at offset {} runs past end of segment {} but an intact record follows at offset {}",
                        start, segment_id, next
                    )));
                }
                tracing::warn!(
                    "Segment {} ends in a partial record at offset {}; ignoring the tail",
                    segment_id,
                    start
                );
                stats.truncated_tail = true;
                break;
            }
            Err(e) => return Err(e),
        };

        match record.op()? {
            OpCode::Set => {
                sink.apply_set(record.key, record.value, segment_id, offset);
                stats.sets += 1;
            }
            OpCode::Delete => {
                sink.apply_delete(&record.key);
                stats.deletes += 1;
            }
        }
        stats.records_applied += 1;
    }

    tracing::debug!(
        "Replayed segment {}: {} records ({} sets, {} deletes)",
        segment_id,
        stats.records_applied,
        stats.sets,
        stats.deletes
    );

    Ok(stats)
}

/// Offset of the first checksum-valid record that starts after `start`
///
/// Distinguishes a torn final write (nothing decodable follows) from a
/// length field corrupted mid-segment (later records are still intact).
fn find_intact_record_after(path: &Path, start: u64) -> Result<Option<u64>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start + 1))?;
    let mut rest = Vec::new();
    file.read_to_end(&mut rest)?;

    let candidates = rest
        .windows(MAGIC.len())
        .enumerate()
        .filter(|(_, window)| window[..] == MAGIC[..])
        .map(|(pos, _)| pos);

    for pos in candidates {
        let mut cursor = &rest[pos..];
        if let Ok(Some(_)) = decode(&mut cursor) {
            return Ok(Some(start + 1 + pos as u64));
        }
    }
    Ok(None)
}
