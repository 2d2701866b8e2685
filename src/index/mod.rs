//! Index Module
//!
//! In-memory structures rebuilt by replay and maintained on every write.
//!
//! ## Responsibilities
//! - `ValueCache`: key → current value; serves every `get`
//! - `Index`: key → (segment, offset) of the latest `Set`; persisted by snapshots
//! - `BloomFilter`: insert-only negative-lookup pre-check
//!
//! The engine mutates all three under its single write lock. There is no
//! linkage between them beyond that: each call site updates each structure.

mod bloom;
mod cache;
mod table;

pub use bloom::BloomFilter;
pub use cache::ValueCache;
pub use table::Index;

/// Location of a key's latest value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Segment holding the record
    pub segment_id: u64,

    /// Byte offset of the record within that segment
    pub offset: u64,
}
