//! Segment Log Module
//!
//! Append-only segment files holding checksum-framed records.
//!
//! ## Responsibilities
//! - Frame and parse Set/Delete records with CRC32 checksums
//! - Append to the single active segment, fsync per operation
//! - Discover segments on disk by file name
//! - Replay segments to rebuild in-memory state
//!
//! ## Record Format
//! ```text
//! ┌───────────┬────────┬─────────────┬───────────────┬─────┬─────────┬──────────┐
//! │ Magic (2) │ Op (1) │ KeyLen (4)  │ ValueLen (4)  │ Key │ Value * │ CRC (4)  │
//! └───────────┴────────┴─────────────┴───────────────┴─────┴─────────┴──────────┘
//!   0xF0 0xF1   1=Set     u32 LE        u32 LE                          u32 LE
//!               2=Delete                (0 for Delete)   * Set only
//! ```
//!
//! The CRC covers Op, KeyLen, ValueLen, Key and Value.
//!
//! ## Segment Files
//! `segment-<id>.dat`, where `<id>` is a decimal u64. Higher IDs are newer;
//! replay and compaction walk segments in ascending ID order.

mod files;
mod reader;
mod record;
mod recovery;
mod writer;

pub use files::{find_segments, parse_segment_id, segment_path, SEGMENT_PREFIX, SEGMENT_SUFFIX};
pub use reader::SegmentReader;
pub use record::{decode, encode, OpCode, Record, CHECKSUM_SIZE, HEADER_SIZE, MAGIC};
pub use recovery::{replay_segment, ReplaySink, ReplayStats};
pub use writer::SegmentWriter;
