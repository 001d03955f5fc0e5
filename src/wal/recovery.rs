//! WAL Recovery
//!
//! Reads back the log a previous session left behind.

use serde_json::Value;

use crate::backend::StorageBackend;
use crate::error::Result;

use super::WalOperation;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of operations returned for replay
    pub ops_recovered: u64,

    /// Number of entries that were not a known operation
    pub ops_skipped: u64,

    /// Recovered operations that could not be replayed (set by the store)
    pub ops_failed: u64,

    /// Whether the stored log was not a JSON array at all
    pub was_corrupt: bool,
}

impl WalRecovery {
    /// Recover pending operations from `storage_key`
    ///
    /// This will:
    /// 1. Read the stored log (missing log = nothing to recover)
    /// 2. Treat an unparseable log as empty
    /// 3. Skip entries that are not a known operation
    /// 4. Return the remaining operations in append order
    ///
    /// The stored log is not modified.
    pub fn recover(
        backend: &dyn StorageBackend,
        storage_key: &str,
    ) -> Result<(Vec<WalOperation>, RecoveryResult)> {
        let mut result = RecoveryResult::default();

        let raw = match backend.get_item(storage_key)? {
            Some(raw) => raw,
            None => return Ok((Vec::new(), result)),
        };

        let entries: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to parse WAL {}: {}", storage_key, e);
                result.was_corrupt = true;
                return Ok((Vec::new(), result));
            }
        };

        let mut ops = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<WalOperation>(entry) {
                Ok(op) => {
                    ops.push(op);
                    result.ops_recovered += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping unrecognized WAL entry: {}", e);
                    result.ops_skipped += 1;
                }
            }
        }

        Ok((ops, result))
    }
}
