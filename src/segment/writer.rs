//! Segment Writer
//!
//! Appends framed records to the active segment.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ResultExt, Result};

use super::files::segment_path;
use super::record::Record;

/// Append-only writer for the active segment
pub struct SegmentWriter {
    /// Segment ID (also encoded in the file name)
    id: u64,
    /// Path to the segment file
    path: PathBuf,
    /// Buffered writer over the append-mode file
    writer: BufWriter<File>,
    /// Bytes in the segment, flushed or not; next record lands here
    offset: u64,
}

impl SegmentWriter {
    /// Open (or create) the segment with the given ID for appending
    pub fn open(dir: &Path, id: u64) -> Result<Self> {
        let path = segment_path(dir, id);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open segment {}", id))?;

        let offset = file
            .metadata()
            .with_context(|| format!("stat segment {}", id))?
            .len();

        Ok(Self {
            id,
            path,
            writer: BufWriter::new(file),
            offset,
        })
    }

    /// Append a record, returning the offset it was written at
    ///
    /// The record is buffered; call `sync()` to make it durable.
    pub fn append(&mut self, record: &Record) -> Result<u64> {
        let offset = self.offset;
        let written = record.write_to(&mut self.writer).context("write record")?;
        self.offset += written;
        Ok(offset)
    }

    /// Flush buffered records to the OS
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("flush segment")
    }

    /// Flush and fsync the segment file
    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        self.writer.get_ref().sync_all().context("sync segment")
    }

    /// Current size of the segment in bytes (including buffered data)
    pub fn size(&self) -> u64 {
        self.offset
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
