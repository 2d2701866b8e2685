//! Compaction
//!
//! Full rewrite of live data into a single fresh segment, plus an optional
//! background scheduler that triggers it by segment count.
//!
//! ## Phases
//! ```text
//! Listing ──▶ Removing ──▶ Rewriting ──▶ Snapshotting
//! (find      (delete every (segment 0 ←   (index.snapshot)
//!  segments)  listed file)  every live Set)
//! ```
//!
//! The sequence is NOT crash-atomic. A crash after `Removing` starts can
//! leave the directory with no segments; nothing resumes a half-done
//! compaction. An error after `Removing` starts leaves the engine without an
//! active segment, so later writes fail with `NoActiveSegment` until it is
//! reopened. A closed engine refuses to compact.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};
use tracing::field;

use crate::engine::{Engine, EngineState};
use crate::error::{KvError, Result};
use crate::index::Index;
use crate::segment::{find_segments, segment_path, Record};
use crate::snapshot::{self, SNAPSHOT_FILENAME};

/// Segment ID the compacted data is written to
pub const COMPACTED_SEGMENT_ID: u64 = 0;

/// Step of a running compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionPhase {
    Listing,
    Removing,
    Rewriting,
    Snapshotting,
}

impl fmt::Display for CompactionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompactionPhase::Listing => "listing",
            CompactionPhase::Removing => "removing",
            CompactionPhase::Rewriting => "rewriting",
            CompactionPhase::Snapshotting => "snapshotting",
        };
        f.write_str(name)
    }
}

/// What a compaction did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactionSummary {
    pub segments_removed: usize,
    pub keys_written: usize,
    pub bytes_written: u64,
}

/// Wrap an error with "compaction (<phase>)" or "compaction (<phase>): <what>"
fn phase_error(phase: CompactionPhase, what: Option<String>, err: KvError) -> KvError {
    match what {
        Some(what) => err.context(format!("compaction ({}): {}", phase, what)),
        None => err.context(format!("compaction ({})", phase)),
    }
}

/// Rewrite every live key into segment 0 and snapshot the rebuilt index
///
/// Called with the engine's write lock held.
pub(crate) fn compact(state: &mut EngineState, dir: &Path) -> Result<CompactionSummary> {
    if state.active.is_none() {
        return Err(KvError::NoActiveSegment);
    }

    let span = tracing::debug_span!("compaction", dir = %dir.display(), phase = field::Empty);
    let _enter = span.enter();
    let mut summary = CompactionSummary::default();

    // Listing
    let phase = CompactionPhase::Listing;
    span.record("phase", field::display(phase));
    tracing::debug!("Compaction phase: {}", phase);
    let segments = find_segments(dir).map_err(|e| phase_error(phase, None, e))?;

    // Removing: seal the active writer first so nothing is left buffered
    let phase = CompactionPhase::Removing;
    span.record("phase", field::display(phase));
    tracing::debug!("Compaction phase: {} ({} segments)", phase, segments.len());
    if let Some(active) = state.active.as_mut() {
        active.flush().map_err(|e| phase_error(phase, None, e))?;
    }
    state.active = None;

    // Each ID leaves the set as its file goes, so a failure part-way keeps
    // the set matching what is still on disk.
    for id in segments {
        match fs::remove_file(segment_path(dir, id)) {
            Ok(()) => summary.segments_removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(phase_error(
                    phase,
                    Some(format!("remove segment {}", id)),
                    e.into(),
                ))
            }
        }
        state.segments.remove(&id);
    }

    // Rewriting
    let phase = CompactionPhase::Rewriting;
    span.record("phase", field::display(phase));
    tracing::debug!("Compaction phase: {} ({} keys)", phase, state.values.len());
    state
        .reset_active_segment(dir, COMPACTED_SEGMENT_ID)
        .map_err(|e| phase_error(phase, Some("reset active segment".to_string()), e))?;

    let writer = state.active.as_mut().ok_or(KvError::NoActiveSegment)?;
    let mut index = Index::new();

    for (key, value) in state.values.iter() {
        let record = Record::set(key.clone(), value.clone());
        let offset = writer
            .append(&record)
            .map_err(|e| phase_error(phase, None, e))?;
        index.insert(key.clone(), COMPACTED_SEGMENT_ID, offset);
        summary.keys_written += 1;
    }
    writer.sync().map_err(|e| phase_error(phase, None, e))?;
    summary.bytes_written = writer.size();
    state.index = index;

    // Snapshotting
    let phase = CompactionPhase::Snapshotting;
    span.record("phase", field::display(phase));
    tracing::debug!("Compaction phase: {}", phase);
    snapshot::save(&state.index, &dir.join(SNAPSHOT_FILENAME))
        .map_err(|e| phase_error(phase, Some("save snapshot".to_string()), e))?;

    Ok(summary)
}

// =============================================================================
// Background Scheduler
// =============================================================================

/// Periodically compacts the engine once enough segments pile up
///
/// Every `compaction_interval` it reads `stats()` and runs `compact()` when
/// `num_segments >= compaction_threshold`. It goes through the engine's
/// normal locking, so it contends with foreground traffic.
pub struct CompactionScheduler {
    /// Dropping this wakes the worker and ends its loop
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CompactionScheduler {
    /// Start the scheduler using the engine's configured threshold/interval
    pub fn start(engine: Arc<Engine>) -> Result<Self> {
        let threshold = engine.config().compaction_threshold;
        let interval = engine.config().compaction_interval;
        Self::start_with(engine, threshold, interval)
    }

    /// Start the scheduler with an explicit threshold and interval
    pub fn start_with(engine: Arc<Engine>, threshold: usize, interval: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("segkv-compactor".to_string())
            .spawn(move || {
                let ticker = channel::tick(interval);
                tracing::debug!(
                    "Compaction scheduler started: threshold {} segments, every {:?}",
                    threshold,
                    interval
                );

                loop {
                    channel::select! {
                        recv(shutdown_rx) -> _ => break,
                        recv(ticker) -> _ => match run_once(&engine, threshold) {
                            Ok(_) => {}
                            Err(KvError::NoActiveSegment) => {
                                tracing::debug!("Engine closed to writes, stopping compaction scheduler");
                                break;
                            }
                            Err(e) => tracing::error!("Compaction error: {}", e),
                        }
                    }
                }

                tracing::debug!("Compaction scheduler stopped");
            })?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop the worker and wait for it to exit
    ///
    /// A compaction already in progress finishes first.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Compaction scheduler thread panicked");
            }
        }
    }
}

impl Drop for CompactionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One scheduler tick: compact if the segment count reached `threshold`
///
/// Returns whether a compaction ran.
pub fn run_once(engine: &Engine, threshold: usize) -> Result<bool> {
    let stats = engine.stats();
    if stats.num_segments < threshold {
        return Ok(false);
    }

    tracing::info!(
        "Auto-compaction triggered ({} segments >= {} threshold)",
        stats.num_segments,
        threshold
    );
    let start = Instant::now();
    engine.compact()?;
    tracing::info!("Auto-compaction completed in {:.2?}", start.elapsed());

    Ok(true)
}
