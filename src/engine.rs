//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Recover state on open (snapshot + segment replay)
//! - Append every write to the active segment and fsync before acknowledging
//! - Keep the value cache, index and bloom filter in step with the log
//! - Rotate segments by size, compact and snapshot on request

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::compaction;
use crate::config::Config;
use crate::error::{KvError, ResultExt, Result};
use crate::index::{BloomFilter, Index, ValueCache};
use crate::segment::{
    find_segments, replay_segment, segment_path, Record, ReplaySink, ReplayStats, SegmentWriter,
};
use crate::snapshot::{self, SNAPSHOT_FILENAME};
use crate::stats::StoreStats;

/// The main storage engine
///
/// ## Concurrency Model: one reader-writer lock
///
/// - **Writes** (set/delete/compact/save_snapshot/close): exclusive lock held
///   for the whole operation, disk I/O included
/// - **Reads** (get/list_keys/stats): shared lock, concurrent with each other
///
/// There is no finer-grained locking; a compaction blocks everyone until it
/// finishes.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// All mutable state
    state: RwLock<EngineState>,
}

/// Everything the engine lock guards
pub(crate) struct EngineState {
    /// key → value; the only structure `get` reads
    pub(crate) values: ValueCache,

    /// key → (segment, offset) of the latest `Set`
    pub(crate) index: Index,

    /// Insert-only; never rebuilt, never shrinks
    pub(crate) bloom: BloomFilter,

    /// Writer for the active segment (None once closed)
    pub(crate) active: Option<SegmentWriter>,

    /// ID of the active segment
    pub(crate) active_segment_id: u64,

    /// Every segment ID known to be on disk, active one included
    pub(crate) segments: BTreeSet<u64>,
}

impl EngineState {
    fn new(config: &Config) -> Self {
        Self {
            values: ValueCache::new(),
            index: Index::new(),
            bloom: BloomFilter::new(
                config.bloom_expected_items,
                config.bloom_false_positive_rate,
            ),
            active: None,
            active_segment_id: 0,
            segments: BTreeSet::new(),
        }
    }

    /// Seal the current active segment (flush) and open `id` in its place
    pub(crate) fn reset_active_segment(&mut self, dir: &Path, id: u64) -> Result<()> {
        if let Some(active) = self.active.as_mut() {
            active.flush()?;
        }
        self.active = None;

        let writer = SegmentWriter::open(dir, id)?;
        self.active = Some(writer);
        self.active_segment_id = id;
        self.segments.insert(id);
        Ok(())
    }

    /// Append a record and fsync it, returning (segment_id, offset, segment_size)
    fn append_durable(&mut self, record: &Record) -> Result<(u64, u64, u64)> {
        let active = self.active.as_mut().ok_or(KvError::NoActiveSegment)?;
        let offset = active.append(record)?;
        active.sync()?;
        Ok((active.id(), offset, active.size()))
    }
}

impl ReplaySink for EngineState {
    fn apply_set(&mut self, key: String, value: Bytes, segment_id: u64, offset: u64) {
        self.index.insert(key.clone(), segment_id, offset);
        self.bloom.insert(&key);
        self.values.insert(key, value);
    }

    fn apply_delete(&mut self, key: &str) {
        self.values.remove(key);
        self.index.remove(key);
    }
}

/// ID of the segment after `id`
fn next_segment_id(id: u64) -> Result<u64> {
    id.checked_add(1)
        .ok_or_else(|| KvError::Corrupted(format!("segment ID {} leaves no room for a successor", id)))
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory if it doesn't exist
    /// 2. Load the index snapshot, if present (failure → warn, empty index)
    /// 3. Replay every segment in ascending ID order
    /// 4. Open a fresh active segment at max(existing) + 1 (or 1)
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Create data directory if it doesn't exist
        fs::create_dir_all(&config.data_dir).context("create data directory")?;

        let dir = config.data_dir.clone();
        let mut state = EngineState::new(&config);

        // Step 2: Start from the snapshot's index, if one loads
        let snapshot_path = dir.join(SNAPSHOT_FILENAME);
        if snapshot_path.exists() {
            match snapshot::load(&snapshot_path) {
                Ok(index) => {
                    tracing::info!("Loaded index from snapshot ({} keys)", index.len());
                    state.index = index;
                }
                Err(e) => {
                    tracing::warn!("Failed to load snapshot: {}, rebuilding from segments", e);
                }
            }
        }

        // Step 3: Replay segments oldest → newest
        let segments = find_segments(&dir)?;
        let start = Instant::now();
        let mut totals = ReplayStats::default();

        for &id in &segments {
            let path = segment_path(&dir, id);
            let stats = replay_segment(&path, id, &mut state)
                .with_context(|| format!("replay segment {}", id))?;
            totals.merge(stats);
        }

        if !segments.is_empty() {
            tracing::info!(
                "Replayed {} segments in {:.2?}: {} records, {} live keys{}",
                segments.len(),
                start.elapsed(),
                totals.records_applied,
                state.values.len(),
                if totals.truncated_tail { " (partial tail ignored)" } else { "" }
            );
        }

        // Step 4: New active segment after the newest existing one
        let next_id = match segments.last() {
            Some(&id) => next_segment_id(id)?,
            None => 1,
        };
        state.segments = segments.into_iter().collect();
        state
            .reset_active_segment(&dir, next_id)
            .context("open active segment")?;

        tracing::debug!("Engine open at {} (active segment {})", dir.display(), next_id);

        Ok(Self {
            config,
            state: RwLock::new(state),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().data_dir(path.as_ref()).build();
        Self::open(config)
    }

    /// Get a value by key
    ///
    /// Served entirely from the value cache. Returns `KeyNotFound` for keys
    /// never written or since deleted.
    pub fn get(&self, key: &str) -> Result<Bytes> {
        let state = self.state.read();

        if let Some(value) = state.values.get(key) {
            return Ok(value);
        }

        // The cache miss already decides the outcome; the filter is only
        // consulted for diagnostics.
        if !state.bloom.might_contain(key) {
            tracing::trace!("Bloom filter: {:?} was never written", key);
        }

        Err(KvError::KeyNotFound)
    }

    /// Set a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Append record to the active segment, flush + fsync
    /// 3. Update value cache, index and bloom filter
    /// 4. Rotate the segment if it reached `max_segment_size`
    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut state = self.state.write();

        let record = Record::set(key, Bytes::copy_from_slice(value));
        let (segment_id, offset, size) = state.append_durable(&record)?;

        state.values.insert(key, record.value);
        state.index.insert(key, segment_id, offset);
        state.bloom.insert(key);

        if size >= self.config.max_segment_size {
            let next_id = next_segment_id(segment_id)?;
            state
                .reset_active_segment(&self.config.data_dir, next_id)
                .context("rotate segment")?;
            tracing::debug!(
                "Rotated segment {} ({} bytes) → segment {}",
                segment_id,
                size,
                next_id
            );
        }

        Ok(())
    }

    /// Delete a key
    ///
    /// A delete record is appended even if the key doesn't exist.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.write();

        state.append_durable(&Record::delete(key))?;

        state.values.remove(key);
        state.index.remove(key);

        Ok(())
    }

    /// All live keys, sorted lexicographically
    pub fn list_keys(&self) -> Vec<String> {
        self.state.read().values.sorted_keys()
    }

    /// Current statistics
    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();

        StoreStats {
            num_keys: state.values.len(),
            num_segments: state.segments.len(),
            total_bytes: state.values.total_bytes(),
            active_segment_id: state.active_segment_id,
            oldest_segment_id: state.segments.first().copied().unwrap_or(0),
        }
    }

    /// Rewrite all live data into a single fresh segment
    ///
    /// Not crash-atomic: a crash part-way through can lose data.
    pub fn compact(&self) -> Result<()> {
        let mut state = self.state.write();
        let start = Instant::now();

        let summary = compaction::compact(&mut state, &self.config.data_dir)?;

        tracing::info!(
            "Compaction finished in {:.2?}: removed {} segments, wrote {} keys ({} bytes)",
            start.elapsed(),
            summary.segments_removed,
            summary.keys_written,
            summary.bytes_written
        );
        Ok(())
    }

    /// Persist the index to `index.snapshot`
    pub fn save_snapshot(&self) -> Result<()> {
        let state = self.state.write();
        let path = self.config.data_dir.join(SNAPSHOT_FILENAME);
        snapshot::save(&state.index, &path).context("save snapshot")
    }

    /// Flush, fsync and close the active segment
    ///
    /// Calling it again is a no-op. Writes after close fail with
    /// `NoActiveSegment`.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.write();

        if let Some(active) = state.active.as_mut() {
            active.sync().context("close active segment")?;
        }
        state.active = None;

        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// ID of the segment currently receiving writes
    pub fn active_segment_id(&self) -> u64 {
        self.state.read().active_segment_id
    }

    /// Path of the active segment file
    pub fn active_segment_path(&self) -> PathBuf {
        segment_path(&self.config.data_dir, self.active_segment_id())
    }
}
