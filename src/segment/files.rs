//! Segment file naming and discovery

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ResultExt, Result};

pub const SEGMENT_PREFIX: &str = "segment-";
pub const SEGMENT_SUFFIX: &str = ".dat";

/// Generate the path of the segment with the given ID
/// 42 → "{dir}/segment-42.dat"
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{}{}", SEGMENT_PREFIX, id, SEGMENT_SUFFIX))
}

/// Parse a segment ID from a file name
/// "segment-42.dat" → Some(42)
///
/// Only the canonical decimal form is accepted: "segment-+5.dat" and
/// "segment-01.dat" are not segments, since `segment_path` never produces
/// them.
pub fn parse_segment_id(name: &str) -> Option<u64> {
    let id_str = name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?;

    if id_str.is_empty() || !id_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let id: u64 = id_str.parse().ok()?;
    if id.to_string() != id_str {
        return None;
    }
    Some(id)
}

/// List every segment ID in `dir`, ascending
///
/// Names that don't look like segments, or whose ID doesn't parse, are
/// skipped.
pub fn find_segments(dir: &Path) -> Result<Vec<u64>> {
    let mut ids = Vec::new();

    for entry in fs::read_dir(dir).context("find segments")? {
        let entry = entry.context("find segments")?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if !(name.starts_with(SEGMENT_PREFIX) && name.ends_with(SEGMENT_SUFFIX)) {
            continue;
        }

        match parse_segment_id(&name) {
            Some(id) => ids.push(id),
            None => tracing::debug!("Skipping malformed segment file name: {}", name),
        }
    }

    ids.sort_unstable();
    Ok(ids)
}
