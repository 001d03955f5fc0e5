//! Store Module
//!
//! The key-value façade that coordinates all components.
//!
//! ## Responsibilities
//! - Route reads through the index to a single chunk
//! - Write through immediately, or queue and batch writes
//! - Keep index, WAL and metadata consistent with the chunks
//! - Recover pending writes from the WAL on open

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::backend::{utf16_len, StorageBackend};
use crate::chunk::{Chunk, ChunkAllocator, ChunkId, ChunkSizes};
use crate::codec::Codec;
use crate::config::{Config, FlushPolicy};
use crate::error::{Result, StoreError};
use crate::index::Index;
use crate::meta::{Metadata, MigrationOutcome};
use crate::queue::{DebounceTimer, PendingWrite, WriteBatch, WriteQueue};
use crate::stats::{ChunkStat, StoreStats};
use crate::wal::{RecoveryResult, WalOperation, WalRecovery, WriteAheadLog};

/// Outcome of applying writes to chunks
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Distinct logical keys written
    pub keys_written: usize,

    /// Physical chunk writes performed
    pub chunks_written: usize,

    /// Writes dropped because no chunk slot could take them
    pub keys_rejected: usize,
}

/// The storage manager
///
/// ## Execution Model
///
/// All state sits behind one mutex and every operation runs to completion
/// while holding it, so operations never interleave. The debounce timer
/// thread is the only deferred work; it takes the same lock to flush.
///
/// Dropping a `Store` stops the timer without flushing, leaving queued
/// writes in the WAL for the next `open`. Use [`Store::close`] for a clean
/// shutdown.
pub struct Store<B: StorageBackend> {
    inner: Arc<Mutex<StoreInner<B>>>,

    /// Present only with `FlushPolicy::Debounce`
    timer: Option<DebounceTimer>,
}

struct StoreInner<B: StorageBackend> {
    config: Config,
    backend: B,
    codec: Codec,
    allocator: ChunkAllocator,
    compression_enabled: bool,
    meta: Metadata,
    index: Index,
    wal: WriteAheadLog,
    queue: WriteQueue,
}

impl<B: StorageBackend> Store<B> {
    /// Open a store over `backend`
    ///
    /// On startup:
    /// 1. Load or create metadata, migrating the stored version
    /// 2. Load the index
    /// 3. Replay any WAL left by a previous session, then clear it
    /// 4. Start the flush timer (debounce policy only)
    pub fn open(backend: B, config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Metadata + migrations
        let meta_key = config.meta_key();
        let mut meta = Metadata::load_or_create(&backend, &meta_key, &config.format_version)?;
        if let MigrationOutcome::Migrated { .. } = meta.migrate(&config.format_version) {
            meta.save(&backend, &meta_key)?;
        }

        // Step 2: Index
        let index = Index::load(&backend, &config.index_key());

        let mut inner = StoreInner {
            codec: Codec::new(),
            allocator: ChunkAllocator::from_config(&config),
            compression_enabled: config.compression_enabled,
            wal: WriteAheadLog::new(config.wal_key()),
            queue: WriteQueue::new(),
            config,
            backend,
            meta,
            index,
        };

        // Step 3: Crash recovery
        inner.recover()?;

        // Step 4: Flush timer
        let flush_policy = inner.config.flush_policy;
        let inner = Arc::new(Mutex::new(inner));
        let timer = match flush_policy {
            FlushPolicy::Debounce { delay } => {
                let weak = Arc::downgrade(&inner);
                Some(DebounceTimer::spawn(delay, move || {
                    if let Some(inner) = weak.upgrade() {
                        if let Err(e) = inner.lock().flush_queue() {
                            tracing::error!("Scheduled flush failed: {}", e);
                        }
                    }
                })?)
            }
            FlushPolicy::Manual => None,
        };

        Ok(Self { inner, timer })
    }

    /// Get the value stored under `key`
    ///
    /// Returns `None` when the key is not indexed, or when its chunk is
    /// missing or unreadable (logged, not an error). Queued writes that
    /// have not been flushed are not visible.
    pub fn get(&self, key: &str) -> Option<Value> {
        let start = Instant::now();
        let inner = self.inner.lock();
        let value = inner.read(key);
        inner.log_performance("get", start.elapsed());
        value
    }

    /// Get the value under `key` deserialized as `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                tracing::warn!("Value under {} has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Store `value` under `key`
    ///
    /// With `immediate`, the chunk, index and metadata are written before
    /// returning. Otherwise the write is logged to the WAL, queued, and the
    /// flush timer is restarted.
    ///
    /// Returns `Ok(false)` when the write could not be performed (the cause
    /// is logged). Only an exhausted chunk ceiling is returned as an error.
    pub fn set<V: Serialize + ?Sized>(&self, key: &str, value: &V, immediate: bool) -> Result<bool> {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize value for {}: {}", key, e);
                return Ok(false);
            }
        };

        let mut inner = self.inner.lock();

        if immediate {
            let start = Instant::now();
            let result = inner.write_immediate(key.to_string(), value);
            inner.log_performance("set", start.elapsed());
            return match result {
                Ok(_) => Ok(true),
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => {
                    tracing::error!("Immediate write of {} failed: {}", key, e);
                    Ok(false)
                }
            };
        }

        if let Err(e) = inner.enqueue(key.to_string(), value) {
            tracing::error!("Failed to queue write of {}: {}", key, e);
            return Ok(false);
        }
        drop(inner);

        if let Some(timer) = &self.timer {
            timer.reset();
        }
        Ok(true)
    }

    /// Delete `key`
    ///
    /// Also drops any queued writes for `key`. Deleting a key that does
    /// not exist succeeds.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.remove(key) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Delete of {} failed: {}", key, e);
                false
            }
        }
    }

    /// All keys in the index
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().index.keys()
    }

    /// Remove everything this store owns and reset to an empty store
    pub fn clear(&self) -> bool {
        let mut inner = self.inner.lock();
        let result = inner.clear();
        if let Some(timer) = &self.timer {
            timer.cancel();
        }
        drop(inner);

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Clear failed: {}", e);
                false
            }
        }
    }

    /// Size report computed from the physical chunks
    pub fn stats(&self) -> StoreStats {
        self.inner.lock().stats()
    }

    /// Flush queued writes now
    ///
    /// Writes that no chunk can take are dropped and the rest are still
    /// persisted; the call then returns `CapacityExhausted`.
    pub fn flush(&self) -> Result<FlushReport> {
        let mut inner = self.inner.lock();
        let report = inner.flush_queue();
        // Under the lock, so a concurrent `set` re-arms after this
        if inner.queue.is_empty() {
            if let Some(timer) = &self.timer {
                timer.cancel();
            }
        }
        report
    }

    /// Flush queued writes and stop the timer
    pub fn close(self) -> Result<()> {
        self.flush()?;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Toggle compression for chunks written from now on.
    ///
    /// Existing chunks keep the form they were written in.
    pub fn set_compression_enabled(&self, enabled: bool) {
        self.inner.lock().compression_enabled = enabled;
    }

    pub fn compression_enabled(&self) -> bool {
        self.inner.lock().compression_enabled
    }

    /// Number of queued, unflushed writes
    pub fn pending_writes(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Number of operations in the WAL
    pub fn wal_len(&self) -> usize {
        self.inner.lock().wal.len()
    }

    /// Snapshot of the metadata record
    pub fn metadata(&self) -> Metadata {
        self.inner.lock().meta.clone()
    }

    pub fn config(&self) -> Config {
        self.inner.lock().config.clone()
    }
}

impl<B: StorageBackend> StoreInner<B> {
    // =========================================================================
    // Reads
    // =========================================================================

    fn read(&self, key: &str) -> Option<Value> {
        let chunk_key = self.index.get(key)?;

        let stored = match self.backend.get_item(chunk_key) {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                tracing::warn!("Chunk {} not found for key {}", chunk_key, key);
                return None;
            }
            Err(e) => {
                tracing::error!("Failed to read chunk {}: {}", chunk_key, e);
                return None;
            }
        };

        let Some(id) = ChunkId::parse(chunk_key, &self.config.prefix) else {
            tracing::warn!("Index entry for {} names unknown chunk {}", key, chunk_key);
            return None;
        };

        match Chunk::decode(id, &stored, &self.codec, self.compression_enabled) {
            Ok(chunk) => chunk.get(key).cloned(),
            Err(e) => {
                tracing::warn!("Failed to decode chunk for {}: {}", key, e);
                None
            }
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    fn write_immediate(&mut self, key: String, value: Value) -> Result<FlushReport> {
        let report = self.apply(vec![(key.clone(), value)])?;
        if report.keys_rejected > 0 {
            return Err(self.capacity_error());
        }
        // A queued older value must not overwrite this one at the next flush
        self.discard_pending(&key)?;
        Ok(report)
    }

    fn enqueue(&mut self, key: String, value: Value) -> Result<()> {
        // Logged first: a write is only queued once it would survive a crash
        self.wal
            .append(&self.backend, WalOperation::set(key.clone(), value.clone()))?;
        self.queue.push(PendingWrite::new(key, value));
        Ok(())
    }

    fn flush_queue(&mut self) -> Result<FlushReport> {
        if self.queue.is_empty() {
            return Ok(FlushReport::default());
        }

        let start = Instant::now();
        let writes = self.queue.drain();
        let queued = writes.len();

        let report = match self.apply(WriteBatch::coalesce(writes.clone())) {
            Ok(report) => report,
            Err(e) => {
                // WAL is untouched, so the writes also survive a crash
                self.queue.restore(writes);
                return Err(e);
            }
        };

        // Rejected writes go with the rest; they can never be placed
        self.wal.clear(&self.backend)?;

        tracing::debug!(
            "Flushed {} queued writes ({} keys) into {} chunks",
            queued,
            report.keys_written,
            report.chunks_written
        );
        self.log_performance("flush", start.elapsed());

        if report.keys_rejected > 0 {
            tracing::error!("{} queued writes dropped: no chunk has room", report.keys_rejected);
            return Err(self.capacity_error());
        }
        Ok(report)
    }

    /// Write `writes` into their chunks with one store per chunk, then
    /// update the index and metadata.
    ///
    /// Writes that fit nowhere are skipped and counted in `keys_rejected`.
    fn apply(&mut self, writes: Vec<(String, Value)>) -> Result<FlushReport> {
        let prefix = self.config.prefix.clone();

        let batch = {
            let mut sizes = ChunkSizes::new(
                &self.backend,
                &prefix,
                &self.codec,
                self.compression_enabled,
            );
            WriteBatch::plan(writes, &self.index, &prefix, &self.allocator, &mut sizes)?
        };
        let (chunks, placements, rejected) = batch.into_parts();
        if placements.is_empty() {
            return Ok(FlushReport {
                keys_rejected: rejected.len(),
                ..FlushReport::default()
            });
        }

        // Load everything first so an unreadable chunk aborts before any write
        let mut loaded = Vec::with_capacity(chunks.len());
        for (id, mutations) in chunks {
            let chunk = Chunk::load_or_empty(
                &self.backend,
                &prefix,
                id,
                &self.codec,
                self.compression_enabled,
            )?;
            loaded.push((chunk, mutations));
        }

        let mut stored: HashSet<ChunkId> = HashSet::new();
        let mut write_error = None;
        for (mut chunk, mutations) in loaded {
            for key in &mutations.removals {
                chunk.remove(key);
            }
            for (key, value) in mutations.upserts {
                chunk.insert(key, value);
            }

            match chunk.store(&self.backend, &prefix, &self.codec, self.compression_enabled) {
                Ok(_) => {
                    stored.insert(chunk.id());
                }
                Err(e) => {
                    write_error = Some(e);
                    break;
                }
            }
        }

        // Index only what actually reached storage
        for (key, target) in &placements {
            if stored.contains(target) {
                self.index.insert(key.clone(), target.storage_key(&prefix));
            } else if self
                .index
                .chunk_of(key, &prefix)
                .is_some_and(|old| stored.contains(&old))
            {
                // Moved out of its old chunk but never landed
                self.index.remove(key);
            }
        }
        self.index.save(&self.backend, &self.config.index_key())?;

        if let Some(e) = write_error {
            return Err(e);
        }

        self.touch_meta();

        Ok(FlushReport {
            keys_written: placements.len(),
            chunks_written: stored.len(),
            keys_rejected: rejected.len(),
        })
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.remove_persisted(key)?;
        self.discard_pending(key)
    }

    fn remove_persisted(&mut self, key: &str) -> Result<()> {
        let prefix = self.config.prefix.clone();
        let Some(chunk_key) = self.index.get(key).map(str::to_owned) else {
            return Ok(());
        };

        match ChunkId::parse(&chunk_key, &prefix) {
            Some(id) => {
                match Chunk::load(&self.backend, &prefix, id, &self.codec, self.compression_enabled)? {
                    Some(mut chunk) => {
                        if chunk.remove(key).is_some() {
                            chunk.store(&self.backend, &prefix, &self.codec, self.compression_enabled)?;
                        }
                    }
                    None => tracing::warn!("Chunk {} not found while deleting {}", chunk_key, key),
                }
            }
            None => tracing::warn!("Index entry for {} names unknown chunk {}", key, chunk_key),
        }

        self.index.remove(key);
        self.index.save(&self.backend, &self.config.index_key())?;
        self.touch_meta();
        Ok(())
    }

    fn discard_pending(&mut self, key: &str) -> Result<()> {
        if self.queue.discard_key(key) > 0 {
            self.wal.discard_key(&self.backend, key)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let owned: Vec<String> = self
            .backend
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(&self.config.prefix))
            .collect();
        for key in &owned {
            self.backend.remove_item(key)?;
        }

        self.index.clear();
        self.queue.clear();
        self.wal.reset();
        self.meta = Metadata::new(self.config.format_version.clone());
        self.meta.save(&self.backend, &self.config.meta_key())?;

        tracing::info!("Cleared {} storage keys", owned.len());
        Ok(())
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Replay a WAL left behind by a previous session through the
    /// immediate-write path, then clear it.
    ///
    /// An operation that fails to replay is logged and counted; it does not
    /// stop the others or keep the store from opening.
    fn recover(&mut self) -> Result<RecoveryResult> {
        let wal_key = self.config.wal_key();
        let (ops, mut result) = WalRecovery::recover(&self.backend, &wal_key)?;

        if !ops.is_empty() {
            tracing::info!("Replaying WAL with {} operations", ops.len());
        }
        for op in ops {
            match op {
                WalOperation::Set { key, value } => {
                    if let Err(e) = self.write_immediate(key.clone(), value) {
                        tracing::error!("Failed to replay write of {}: {}", key, e);
                        result.ops_failed += 1;
                    }
                }
            }
        }

        if result.ops_recovered > 0 || result.ops_skipped > 0 || result.was_corrupt {
            self.wal.clear(&self.backend)?;
            tracing::info!(
                "WAL recovery: {} operations replayed, {} failed, {} skipped, corrupt={}",
                result.ops_recovered - result.ops_failed,
                result.ops_failed,
                result.ops_skipped,
                result.was_corrupt
            );
        }
        Ok(result)
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    fn stats(&self) -> StoreStats {
        let chunk_prefix = ChunkId::key_prefix(&self.config.prefix);

        let mut chunk_keys: Vec<String> = match self.backend.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&chunk_prefix))
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to list storage keys: {}", e);
                Vec::new()
            }
        };
        chunk_keys.sort_by_key(|k| (ChunkId::parse(k, &self.config.prefix), k.clone()));

        let mut chunks = Vec::with_capacity(chunk_keys.len());
        let mut total_size = 0;
        let mut compressed_size = 0;

        for key in chunk_keys {
            let stored = match self.backend.get_item(&key) {
                Ok(Some(stored)) => stored,
                _ => continue,
            };
            let size = utf16_len(&stored) * 2;
            compressed_size += size;

            // Either form may be on disk; measure whichever decodes
            total_size += self
                .codec
                .decode_candidates(&stored, self.compression_enabled)
                .find(|plain| serde_json::from_str::<Value>(plain).is_ok())
                .map(|plain| utf16_len(&plain) * 2)
                .unwrap_or(size);

            chunks.push(ChunkStat {
                key,
                compressed_size: size,
            });
        }

        StoreStats {
            version: self.config.format_version.clone(),
            total_keys: self.index.len(),
            chunks,
            total_size,
            compressed_size,
            compression_ratio: StoreStats::ratio(compressed_size, total_size),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn capacity_error(&self) -> StoreError {
        StoreError::CapacityExhausted {
            max_chunks: self.allocator.max_chunks(),
        }
    }

    fn touch_meta(&mut self) {
        self.meta.touch();
        if let Err(e) = self.meta.save(&self.backend, &self.config.meta_key()) {
            tracing::error!("Failed to save metadata: {}", e);
        }
    }

    fn log_performance(&self, operation: &str, elapsed: Duration) {
        if elapsed > self.config.slow_operation_threshold {
            tracing::warn!(
                "Slow storage operation: {} took {:.2}ms",
                operation,
                elapsed.as_secs_f64() * 1000.0
            );
        }
    }
}

impl<B: StorageBackend> Drop for Store<B> {
    fn drop(&mut self) {
        let pending = self.inner.lock().queue.len();
        if pending > 0 {
            tracing::debug!("Store dropped with {} unflushed writes (kept in WAL)", pending);
        }
    }
}

