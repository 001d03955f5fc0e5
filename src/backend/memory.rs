//! In-memory backend
//!
//! HashMap-based host store with an optional quota. Clones share state,
//! so a test can drop a store and reopen a new one over the same data.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, StoreError};

use super::{utf16_len, StorageBackend};

/// Shared in-memory host store
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    items: HashMap<String, String>,

    /// Max bytes (UTF-16, key + value) across all items
    quota: Option<usize>,

    /// Number of successful `set_item` calls per key
    writes: HashMap<String, u64>,
}

impl MemoryBackend {
    /// Create an empty, unbounded backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty backend that refuses writes past `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        let backend = Self::default();
        backend.state.write().quota = Some(quota_bytes);
        backend
    }

    /// Bytes currently used (UTF-16, key + value)
    pub fn used_bytes(&self) -> usize {
        let state = self.state.read();
        state
            .items
            .iter()
            .map(|(k, v)| item_bytes(k, v))
            .sum()
    }

    /// Number of times `key` has been written
    pub fn write_count(&self, key: &str) -> u64 {
        self.state.read().writes.get(key).copied().unwrap_or(0)
    }

    /// Number of items stored
    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn item_bytes(key: &str, value: &str) -> usize {
    (utf16_len(key) + utf16_len(value)) * 2
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.read().items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.write();

        if let Some(quota) = state.quota {
            let current: usize = state
                .items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| item_bytes(k, v))
                .sum();
            if current + item_bytes(key, value) > quota {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }

        state.items.insert(key.to_string(), value.to_string());
        *state.writes.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.state.write().items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.state.read().items.keys().cloned().collect())
    }
}
