//! Value cache
//!
//! Full in-memory copy of every live value. This is what `get` reads.

use std::collections::hash_map::{self, HashMap};

use bytes::Bytes;

/// Key → current value, with a running byte total for stats
#[derive(Debug, Default)]
pub struct ValueCache {
    values: HashMap<String, Bytes>,
    /// Sum of `value.len()` over all entries
    total_bytes: u64,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite a key's value
    pub fn insert(&mut self, key: impl Into<String>, value: Bytes) {
        let added = value.len() as u64;
        if let Some(old) = self.values.insert(key.into(), value) {
            self.total_bytes -= old.len() as u64;
        }
        self.total_bytes += added;
    }

    /// Remove a key, returning its value if it was present
    pub fn remove(&mut self, key: &str) -> Option<Bytes> {
        let old = self.values.remove(key)?;
        self.total_bytes -= old.len() as u64;
        Some(old)
    }

    /// Shared handle to the key's value (no copy)
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.values.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// All keys in lexicographic order
    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Bytes> {
        self.values.iter()
    }
}
