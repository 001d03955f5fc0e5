//! Metadata
//!
//! Versioning and migration bookkeeping stored under `{prefix}meta`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::backend::StorageBackend;
use crate::error::Result;

/// Persisted store metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Storage format version
    pub version: String,

    /// Unix millis when the store was created (or last cleared)
    pub created: u64,

    /// Unix millis of the last persisted mutation; never before `created`
    pub updated: u64,

    /// Reserved; kept for compatibility with existing records
    #[serde(default)]
    pub chunks: Vec<String>,
}

/// What happened when metadata was brought up to the current version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    UpToDate,
    Migrated { from: String, to: String },
}

impl Metadata {
    /// Fresh metadata stamped with the current time
    pub fn new(version: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            version: version.into(),
            created: now,
            updated: now,
            chunks: Vec::new(),
        }
    }

    /// Load metadata from `storage_key`.
    ///
    /// Missing or malformed metadata is replaced with fresh defaults, which
    /// are saved right away.
    pub fn load_or_create(
        backend: &dyn StorageBackend,
        storage_key: &str,
        version: &str,
    ) -> Result<Self> {
        match backend.get_item(storage_key)? {
            Some(raw) => match serde_json::from_str::<Metadata>(&raw) {
                Ok(meta) => return Ok(meta),
                Err(e) => tracing::warn!("Failed to load metadata: {}", e),
            },
            None => tracing::debug!("No metadata at {}, creating", storage_key),
        }

        let meta = Self::new(version);
        meta.save(backend, storage_key)?;
        Ok(meta)
    }

    pub fn save(&self, backend: &dyn StorageBackend, storage_key: &str) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        backend.set_item(storage_key, &raw)
    }

    /// Record a persisted mutation
    pub fn touch(&mut self) {
        self.updated = now_millis().max(self.created);
    }

    /// Bring the stored version up to `target`
    pub fn migrate(&mut self, target: &str) -> MigrationOutcome {
        if self.version == target {
            return MigrationOutcome::UpToDate;
        }

        let from = std::mem::replace(&mut self.version, target.to_string());
        tracing::info!("Migrating storage from {} to {}", from, target);
        MigrationOutcome::Migrated {
            from,
            to: target.to_string(),
        }
    }
}

/// Current wall-clock time in unix millis
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
