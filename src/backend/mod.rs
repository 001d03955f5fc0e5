//! Backend Module
//!
//! Host key-value storage the store persists into.
//!
//! ## Responsibilities
//! - String-only get/set/remove by physical key
//! - Enumerate physical keys (for `clear` and statistics)
//! - Report quota exhaustion as `StoreError::QuotaExceeded`
//!
//! ## Size Accounting
//! Sizes are measured in UTF-16 code units, the unit browser-style
//! storage quotas are expressed in. See [`utf16_len`].

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::Result;

/// A bounded, string-only key-value host store
pub trait StorageBackend: Send + Sync + 'static {
    /// Read the value stored under `key`
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Every key currently stored, in no particular order
    fn keys(&self) -> Result<Vec<String>>;
}

/// Length of `s` in UTF-16 code units
pub fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}
