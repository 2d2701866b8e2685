//! Error types for segkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for segkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Checksum mismatch: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Invalid operation code: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("Corrupted data: {0}")]
    Corrupted(String),

    // -------------------------------------------------------------------------
    // Write Path Errors
    // -------------------------------------------------------------------------
    #[error("Record {field} too large: {len} bytes (limit is u32::MAX)")]
    RecordTooLarge { field: &'static str, len: usize },

    #[error("No active segment (engine closed)")]
    NoActiveSegment,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Operation Context
    // -------------------------------------------------------------------------
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<KvError>,
    },
}

impl KvError {
    /// Attach operation context ("find segments", "write record", ...)
    pub fn context(self, context: impl Into<String>) -> Self {
        KvError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with every layer of context peeled off
    pub fn root(&self) -> &KvError {
        let mut err = self;
        while let KvError::Context { source, .. } = err {
            err = source.as_ref();
        }
        err
    }

    /// True if this error (under any context) is `KeyNotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), KvError::KeyNotFound)
    }

    /// True if this error signals on-disk corruption
    pub fn is_corruption(&self) -> bool {
        matches!(
            self.root(),
            KvError::InvalidMagic
                | KvError::ChecksumMismatch { .. }
                | KvError::InvalidOpcode(_)
                | KvError::Corrupted(_)
        )
    }
}

/// Context helpers for `Result`s whose error converts into `KvError`
pub trait ResultExt<T> {
    fn context(self, context: &str) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<KvError>,
{
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
