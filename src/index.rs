//! Index
//!
//! Persisted mapping from logical key to the physical chunk key holding it.
//! Stored as one JSON object under `{prefix}index`:
//!
//! ```text
//! {"entries_2024-01-15": "vl_data_0", "settings": "vl_data_0"}
//! ```

use std::collections::BTreeMap;

use crate::backend::StorageBackend;
use crate::chunk::ChunkId;
use crate::error::Result;

/// Logical key → chunk key mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    entries: BTreeMap<String, String>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index from `storage_key`.
    ///
    /// A missing or malformed index loads as empty.
    pub fn load(backend: &dyn StorageBackend, storage_key: &str) -> Self {
        let raw = match backend.get_item(storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::new(),
            Err(e) => {
                tracing::warn!("Failed to read index {}: {}", storage_key, e);
                return Self::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => Self { entries },
            Err(e) => {
                tracing::warn!("Failed to parse index {}: {}", storage_key, e);
                Self::new()
            }
        }
    }

    /// Persist the index under `storage_key`
    pub fn save(&self, backend: &dyn StorageBackend, storage_key: &str) -> Result<()> {
        let raw = serde_json::to_string(&self.entries)?;
        backend.set_item(storage_key, &raw)
    }

    /// Physical chunk key for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Chunk holding `key`, if its chunk key parses under `prefix`
    pub fn chunk_of(&self, key: &str, prefix: &str) -> Option<ChunkId> {
        self.get(key).and_then(|chunk_key| ChunkId::parse(chunk_key, prefix))
    }

    pub fn insert(&mut self, key: impl Into<String>, chunk_key: impl Into<String>) {
        self.entries.insert(key.into(), chunk_key.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// All logical keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
