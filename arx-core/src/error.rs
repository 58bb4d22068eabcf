//! Error types for ARX cache operations

use std::path::PathBuf;
use thiserror::Error;

/// Cache layer errors.
///
/// `NotFound` is the only signal for an absent key. Payloads that exist but
/// cannot be decoded surface as `Decode`, never as `NotFound`, so callers can
/// tell "never cached" apart from "cached in an incompatible shape".
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Key not found in cache: {key}")]
    NotFound { key: String },

    #[error("A cache layer is already attached")]
    LayerAlreadyAttached,

    #[error("No cache layer attached")]
    NoLayer,

    #[error("Background flush is already active")]
    FlushAlreadyActive,

    #[error("Failed to encode {target} for key {key}: {reason}")]
    Encode {
        key: String,
        target: &'static str,
        reason: String,
    },

    #[error("Failed to decode {target} for key {key}: {reason}")]
    Decode {
        key: String,
        target: &'static str,
        reason: String,
    },

    #[error("I/O failure for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache store at {path:?} unavailable: {source}")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

impl CacheError {
    /// True for misses, false for every other failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
