//! Snapshot Store
//!
//! Serializes the Index to a single file so a restart starts from a known
//! key → location map. Values are not included; replay still supplies them.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (16 bytes)                                       │
//! │   Magic: "KVINDEX1" (8) | EntryCount: u64 LE (8)        │
//! ├─────────────────────────────────────────────────────────┤
//! │ Entries (EntryCount times)                              │
//! │   [KeyLen: u32][Key][SegmentId: u64][Offset: u64]       │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{KvError, Result};
use crate::index::Index;

/// Magic bytes identifying an index snapshot
pub const SNAPSHOT_MAGIC: &[u8; 8] = b"KVINDEX1";

/// Snapshot file name inside the data directory
pub const SNAPSHOT_FILENAME: &str = "index.snapshot";

/// Write `index` to `path`
///
/// The snapshot is written to a sibling temp file, fsynced, then renamed
/// over `path`, so readers only ever see a complete snapshot.
pub fn save(index: &Index, path: &Path) -> Result<()> {
    let tmp_path = temp_path(path);

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(SNAPSHOT_MAGIC)?;
    writer.write_all(&(index.len() as u64).to_le_bytes())?;

    for (key, entry) in index.iter() {
        let key_len = u32::try_from(key.len()).map_err(|_| KvError::RecordTooLarge {
            field: "key",
            len: key.len(),
        })?;
        writer.write_all(&key_len.to_le_bytes())?;
        writer.write_all(key.as_bytes())?;
        writer.write_all(&entry.segment_id.to_le_bytes())?;
        writer.write_all(&entry.offset.to_le_bytes())?;
    }

    writer.flush()?;
    let file = writer.into_inner().map_err(|e| KvError::Io(e.into_error()))?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;

    tracing::debug!("Saved snapshot with {} entries to {}", index.len(), path.display());
    Ok(())
}

/// Read an index back from `path`
pub fn load(path: &Path) -> Result<Index> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != SNAPSHOT_MAGIC {
        return Err(KvError::InvalidMagic);
    }

    let entry_count = read_u64(&mut reader)?;
    let mut index = Index::new();

    for _ in 0..entry_count {
        let key_len = read_u32(&mut reader)?;

        let mut key = Vec::new();
        (&mut reader).take(u64::from(key_len)).read_to_end(&mut key)?;
        if key.len() != key_len as usize {
            return Err(KvError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "snapshot ended inside a key",
            )));
        }
        let key = String::from_utf8(key)
            .map_err(|_| KvError::Corrupted("snapshot key is not valid UTF-8".to_string()))?;

        let segment_id = read_u64(&mut reader)?;
        let offset = read_u64(&mut reader)?;

        index.insert(key, segment_id, offset);
    }

    Ok(index)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
