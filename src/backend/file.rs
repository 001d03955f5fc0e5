//! File backend
//!
//! One file per physical key inside a directory.
//!
//! ## Layout
//! ```text
//! {dir}/
//!   ├── vl_meta.item
//!   ├── vl_index.item
//!   ├── vl_wal.item        (only while writes are pending)
//!   └── vl_data_0.item
//! ```
//!
//! Writes go to a `.tmp` sibling first and are renamed into place, so a
//! crash mid-write leaves either the old or the new value.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

use super::StorageBackend;

/// Directory-backed host store
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    const EXTENSION: &'static str = "item";

    /// Open or create a backend rooted at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let dir = path.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the item files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// "vl_data_3" → {dir}/vl_data_3.item
    fn item_path(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.dir.join(format!("{}.{}", key, Self::EXTENSION)))
    }

    /// Keys become file names, so only a portable character set is allowed
    fn validate_key(key: &str) -> Result<()> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if valid {
            Ok(())
        } else {
            Err(StoreError::InvalidKey(key.to_string()))
        }
    }

    /// "{dir}/vl_index.item" → Some("vl_index")
    fn parse_key(path: &Path) -> Option<String> {
        if path.extension()? != Self::EXTENSION {
            return None;
        }
        Some(path.file_stem()?.to_string_lossy().into_owned())
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.item_path(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let path = self.item_path(key)?;
        let tmp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&tmp_path)?;
        if let Err(e) = file.write_all(value.as_bytes()).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.item_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_path = entry.path();

            if file_path.is_file() {
                if let Some(key) = Self::parse_key(&file_path) {
                    keys.push(key);
                }
            }
        }

        Ok(keys)
    }
}
