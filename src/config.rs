//! Configuration for the storage manager
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{Result, StoreError};

/// Main configuration for a store instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Namespace Configuration
    // -------------------------------------------------------------------------
    /// Prefix for every physical key owned by the store.
    /// Physical layout:
    ///   {prefix}meta     (metadata)
    ///   {prefix}index    (logical key -> chunk key)
    ///   {prefix}wal      (pending writes)
    ///   {prefix}data_N   (chunks)
    pub prefix: String,

    /// Storage format version recorded in metadata
    pub format_version: String,

    // -------------------------------------------------------------------------
    // Chunk Configuration
    // -------------------------------------------------------------------------
    /// Max chunk size, in UTF-16 code units of the stored string
    pub chunk_size: usize,

    /// Hard ceiling on the number of chunks
    pub max_chunks: u32,

    /// Compress chunks written from now on
    pub compression_enabled: bool,

    // -------------------------------------------------------------------------
    // Write Batching Configuration
    // -------------------------------------------------------------------------
    /// When queued writes are flushed
    pub flush_policy: FlushPolicy,

    /// Operations slower than this are logged as warnings
    pub slow_operation_threshold: Duration,
}

/// Flush policy for queued (non-immediate) writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Flush once no new write has arrived for `delay`
    Debounce { delay: Duration },

    /// Never flush on a timer; only `Store::flush`/`Store::close` persist
    Manual,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "vl_".to_string(),
            format_version: "1.0.0".to_string(),
            chunk_size: 500_000, // ~500KB; host stores usually allow 5-10MB
            max_chunks: 100,
            compression_enabled: true,
            flush_policy: FlushPolicy::Debounce {
                delay: Duration::from_secs(5),
            },
            slow_operation_threshold: Duration::from_millis(50),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject configurations the allocator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(StoreError::Config("prefix must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(StoreError::Config("chunk_size must be positive".to_string()));
        }
        if self.max_chunks == 0 {
            return Err(StoreError::Config("max_chunks must be positive".to_string()));
        }
        Ok(())
    }

    /// Physical key of the metadata record
    pub fn meta_key(&self) -> String {
        format!("{}meta", self.prefix)
    }

    /// Physical key of the index
    pub fn index_key(&self) -> String {
        format!("{}index", self.prefix)
    }

    /// Physical key of the write-ahead log
    pub fn wal_key(&self) -> String {
        format!("{}wal", self.prefix)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the physical key prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    /// Set the storage format version
    pub fn format_version(mut self, version: impl Into<String>) -> Self {
        self.config.format_version = version.into();
        self
    }

    /// Set the chunk size threshold (UTF-16 code units)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the maximum number of chunks
    pub fn max_chunks(mut self, count: u32) -> Self {
        self.config.max_chunks = count;
        self
    }

    /// Enable or disable chunk compression
    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.compression_enabled = enabled;
        self
    }

    /// Set the flush policy for queued writes
    pub fn flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.config.flush_policy = policy;
        self
    }

    /// Shorthand for a debounce policy with the given delay
    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.config.flush_policy = FlushPolicy::Debounce { delay };
        self
    }

    /// Set the slow-operation warning threshold
    pub fn slow_operation_threshold(mut self, threshold: Duration) -> Self {
        self.config.slow_operation_threshold = threshold;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
