//! # vibelog-store
//!
//! Storage manager that fits a growing set of time-entry records into a
//! small, string-only key-value host store:
//! - Chunking under a fixed size threshold and chunk ceiling
//! - Whole-chunk LZ compression (UTF-16 safe)
//! - Persisted key → chunk index
//! - Debounced write batching, one physical write per chunk per flush
//! - Write-Ahead Log (WAL) replayed after a crash
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application                              │
//! │        get / set / delete / keys / clear / stats             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Store                                   │
//! │        (one lock, run-to-completion operations)              │
//! └──────┬───────────────────┬──────────────────────┬───────────┘
//!        │ queued            │ immediate            │
//!        ▼                   │                      │
//!   ┌─────────┐   ┌───────┐  │                      │
//!   │   WAL   │◄──│ Queue │  │                      │
//!   └─────────┘   └───┬───┘  │                      │
//!                     │ debounce flush              │
//!                     ▼      ▼                      ▼
//!              ┌──────────────────┐          ┌─────────────┐
//!              │ Chunk Allocator  │          │    Index    │
//!              │  + Codec         │          │  (key→chunk)│
//!              └────────┬─────────┘          └──────┬──────┘
//!                       ▼                           ▼
//!              ┌─────────────────────────────────────────────┐
//!              │   StorageBackend  ({prefix}meta/index/wal/  │
//!              │                    data_N)                  │
//!              └─────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod backend;
pub mod codec;
pub mod index;
pub mod chunk;
pub mod wal;
pub mod queue;
pub mod meta;
pub mod stats;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use config::{Config, FlushPolicy};
pub use error::{Result, StoreError};
pub use stats::StoreStats;
pub use store::{FlushReport, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
