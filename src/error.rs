//! Error types for the storage manager
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for storage manager operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Host Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage quota exceeded while writing {key}")]
    QuotaExceeded { key: String },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Chunk Errors
    // -------------------------------------------------------------------------
    /// No chunk slot within the fixed ceiling can take the write.
    #[error("Storage limit reached - all {max_chunks} chunks are full")]
    CapacityExhausted { max_chunks: u32 },

    #[error("Corrupt chunk {chunk}: {reason}")]
    CorruptChunk { chunk: String, reason: String },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Scheduling Errors
    // -------------------------------------------------------------------------
    #[error("Timer error: {0}")]
    Timer(String),
}

impl StoreError {
    /// Whether this error must reach the caller instead of being folded
    /// into a `false`/`None` result at the façade boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::CapacityExhausted { .. })
    }
}
