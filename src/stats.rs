//! Storage statistics
//!
//! Computed from the physical chunks, not from the index.

use serde::Serialize;

/// Per-chunk size report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkStat {
    /// Physical chunk key
    pub key: String,

    /// Stored size in bytes (UTF-16)
    pub compressed_size: usize,
}

/// Aggregate storage report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Storage format version
    pub version: String,

    /// Keys in the index
    pub total_keys: usize,

    /// Chunks ordered by chunk number
    pub chunks: Vec<ChunkStat>,

    /// Estimated decompressed bytes
    pub total_size: usize,

    /// Stored bytes
    pub compressed_size: usize,

    /// `(1 - compressed/total) * 100`, or 0 for an empty store
    pub compression_ratio: f64,
}

impl StoreStats {
    pub fn ratio(compressed_size: usize, total_size: usize) -> f64 {
        if total_size == 0 {
            return 0.0;
        }
        (1.0 - compressed_size as f64 / total_size as f64) * 100.0
    }
}
