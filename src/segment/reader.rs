//! Segment Reader
//!
//! Sequential iteration over the records of one segment file.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{ResultExt, Result};

use super::record::{decode, Record};

/// Reads records front to back, tracking each record's byte offset
pub struct SegmentReader {
    reader: BufReader<File>,
    /// Offset of the next record to be read
    offset: u64,
}

impl SegmentReader {
    /// Open a segment file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("open segment {}", path.display()))?;

        Ok(Self {
            reader: BufReader::new(file),
            offset: 0,
        })
    }

    /// Read the next record along with the offset it started at
    ///
    /// Returns `Ok(None)` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<(u64, Record)>> {
        match decode(&mut self.reader)? {
            Some(record) => {
                let offset = self.offset;
                self.offset += record.encoded_len() as u64;
                Ok(Some((offset, record)))
            }
            None => Ok(None),
        }
    }

    /// Offset of the next record (equals bytes consumed so far)
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Iterator for SegmentReader {
    type Item = Result<(u64, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
