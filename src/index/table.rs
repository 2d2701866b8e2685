//! Key → segment location index

use std::collections::hash_map::{self, HashMap};

use super::IndexEntry;

/// In-memory map from each live key to where its latest value was written
///
/// Not internally synchronized; the engine lock guards it.
#[derive(Debug, Default, Clone)]
pub struct Index {
    entries: HashMap<String, IndexEntry>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a key's location
    pub fn insert(&mut self, key: impl Into<String>, segment_id: u64, offset: u64) {
        self.entries
            .insert(key.into(), IndexEntry { segment_id, offset });
    }

    /// Drop a key's location (no-op if absent)
    pub fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, in no particular order
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, IndexEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
