//! Configuration for segkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{KvError, Result};

/// Main configuration for a segkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── segment-1.dat     (record stream)
    ///     ├── segment-2.dat
    ///     └── index.snapshot    (serialized index)
    pub data_dir: PathBuf,

    /// Rotate the active segment once its size reaches this many bytes
    pub max_segment_size: u64,

    // -------------------------------------------------------------------------
    // Bloom Filter Configuration
    // -------------------------------------------------------------------------
    /// Number of keys the bloom filter is sized for
    pub bloom_expected_items: usize,

    /// Target false positive rate at `bloom_expected_items`
    pub bloom_false_positive_rate: f64,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Background scheduler compacts once this many segments exist
    pub compaction_threshold: usize,

    /// How often the background scheduler checks segment count
    pub compaction_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./segkv_data"),
            max_segment_size: 16 * 1024 * 1024, // 16 MB
            bloom_expected_items: 50_000,
            bloom_false_positive_rate: 0.01,
            compaction_threshold: 5,
            compaction_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(KvError::Config(
                "max_segment_size must be greater than zero".to_string(),
            ));
        }
        if self.bloom_expected_items == 0 {
            return Err(KvError::Config(
                "bloom_expected_items must be greater than zero".to_string(),
            ));
        }
        if !(self.bloom_false_positive_rate > 0.0 && self.bloom_false_positive_rate < 1.0) {
            return Err(KvError::Config(format!(
                "bloom_false_positive_rate must be in (0, 1), got {}",
                self.bloom_false_positive_rate
            )));
        }
        if self.compaction_threshold == 0 {
            return Err(KvError::Config(
                "compaction_threshold must be at least 1".to_string(),
            ));
        }
        if self.compaction_interval.is_zero() {
            return Err(KvError::Config(
                "compaction_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the segment rotation threshold (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the number of keys the bloom filter is sized for
    pub fn bloom_expected_items(mut self, count: usize) -> Self {
        self.config.bloom_expected_items = count;
        self
    }

    /// Set the bloom filter's target false positive rate
    pub fn bloom_false_positive_rate(mut self, rate: f64) -> Self {
        self.config.bloom_false_positive_rate = rate;
        self
    }

    /// Set the segment count that triggers background compaction
    pub fn compaction_threshold(mut self, segments: usize) -> Self {
        self.config.compaction_threshold = segments;
        self
    }

    /// Set the background compaction check interval
    pub fn compaction_interval(mut self, interval: Duration) -> Self {
        self.config.compaction_interval = interval;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
