//! # segkv
//!
//! An embedded, single-node key-value store with:
//! - Append-only segmented log with CRC32-framed records
//! - fsync on every write before it is acknowledged
//! - Crash recovery by replaying segments oldest → newest
//! - Index snapshots, manual and scheduled full compaction
//! - Single reader-writer lock over all engine state
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │          RwLock<EngineState>  (readers ∥, writers ⊥)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────┬───────────────┐
//!          │            │                 │               │
//!          ▼            ▼                 ▼               ▼
//!   ┌─────────────┐ ┌──────────┐  ┌──────────────┐ ┌────────────┐
//!   │ Value Cache │ │  Index   │  │ Bloom Filter │ │  Segment   │
//!   │ (get path)  │ │ key→loc  │  │  (SHA-256)   │ │    Log     │
//!   └─────────────┘ └────┬─────┘  └──────────────┘ └─────┬──────┘
//!                        │                               │
//!                        ▼                               ▼
//!                 ┌──────────────┐              ┌─────────────────┐
//!                 │index.snapshot│              │ segment-<id>.dat│
//!                 └──────────────┘              └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use segkv::Engine;
//!
//! let engine = Engine::open_path("./data")?;
//! engine.set("greeting", b"hello")?;
//! assert_eq!(&engine.get("greeting")?[..], b"hello");
//! engine.close()?;
//! # Ok::<(), segkv::KvError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod segment;
pub mod index;
pub mod snapshot;
pub mod stats;
pub mod compaction;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use compaction::CompactionScheduler;
pub use config::Config;
pub use engine::Engine;
pub use error::{KvError, Result};
pub use stats::StoreStats;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of segkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
