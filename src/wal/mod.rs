//! Write-Ahead Log (WAL) Module
//!
//! Durable record of writes that are queued but not yet flushed.
//!
//! ## Responsibilities
//! - Persist every queued write before the call returns
//! - Drop the log once the queue has been flushed
//! - Replay pending writes after a crash or unclean shutdown
//!
//! ## Stored Form
//! One JSON array under `{prefix}wal`, removed entirely when empty:
//! ```text
//! [
//!   {"type": "set", "key": "entries_2024-01-15", "value": [...]},
//!   {"type": "set", "key": "settings", "value": {...}}
//! ]
//! ```

mod entry;
mod log;
mod recovery;

pub use entry::WalOperation;
pub use log::WriteAheadLog;
pub use recovery::{RecoveryResult, WalRecovery};
