//! Store statistics

use std::fmt;

/// Read-only view of engine state, derived on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Live keys
    pub num_keys: usize,
    /// Segment files (sealed + active)
    pub num_segments: usize,
    /// Sum of live value sizes in bytes
    pub total_bytes: u64,
    pub active_segment_id: u64,
    /// Lowest segment ID on disk (0 when there are none)
    pub oldest_segment_id: u64,
}

impl StoreStats {
    pub fn total_kb(&self) -> f64 {
        self.total_bytes as f64 / 1024.0
    }

    pub fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Store Statistics:")?;
        writeln!(f, "  Keys: {}", self.num_keys)?;
        writeln!(f, "  Segments: {}", self.num_segments)?;
        writeln!(f, "  Total size: {:.2} MB", self.total_mb())?;
        writeln!(f, "  Active segment: {}", self.active_segment_id)?;
        write!(f, "  Oldest segment: {}", self.oldest_segment_id)
    }
}
