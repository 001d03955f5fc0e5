//! WAL Log
//!
//! In-memory mirror of the persisted log. Every mutation rewrites the
//! whole array, since the host store only supports whole-value writes.

use crate::backend::StorageBackend;
use crate::error::Result;

use super::WalOperation;

/// Pending operations, persisted under one storage key
#[derive(Debug)]
pub struct WriteAheadLog {
    storage_key: String,
    ops: Vec<WalOperation>,
}

impl WriteAheadLog {
    /// Empty log bound to `storage_key` (nothing is read or written)
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            ops: Vec::new(),
        }
    }

    /// Append an operation and persist the log
    pub fn append(&mut self, backend: &dyn StorageBackend, op: WalOperation) -> Result<()> {
        self.ops.push(op);
        if let Err(e) = self.persist(backend) {
            // Keep memory and storage in agreement
            self.ops.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Drop every operation on `key` and persist what remains
    pub fn discard_key(&mut self, backend: &dyn StorageBackend, key: &str) -> Result<usize> {
        let before = self.ops.len();
        self.ops.retain(|op| op.key() != key);
        let removed = before - self.ops.len();
        if removed > 0 {
            self.persist(backend)?;
        }
        Ok(removed)
    }

    /// Empty the log and remove it from storage
    pub fn clear(&mut self, backend: &dyn StorageBackend) -> Result<()> {
        self.ops.clear();
        backend.remove_item(&self.storage_key)
    }

    /// Forget the in-memory operations without touching storage
    pub fn reset(&mut self) {
        self.ops.clear();
    }

    pub fn ops(&self) -> &[WalOperation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn persist(&self, backend: &dyn StorageBackend) -> Result<()> {
        if self.ops.is_empty() {
            return backend.remove_item(&self.storage_key);
        }
        let raw = serde_json::to_string(&self.ops)?;
        backend.set_item(&self.storage_key, &raw)
    }
}
