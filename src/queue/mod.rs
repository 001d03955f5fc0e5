//! Write Batching Module
//!
//! Coalesces non-immediate writes into one physical write per chunk.
//!
//! ## Responsibilities
//! - Hold queued writes in arrival order
//! - Plan a flush: coalesce per key, resolve each key's chunk, group by chunk
//! - Schedule the flush once writes stop arriving (debounce)
//!
//! ## Flow
//! ```text
//! set(k, v) ──► WAL.append ──► WriteQueue.push ──► DebounceTimer.reset
//!                                                        │ (quiet for `delay`)
//!                                                        ▼
//!                        WriteBatch::plan ──► one load/store per chunk
//!                                         ──► index save ──► WAL clear
//! ```

mod batch;
mod pending;
mod timer;

pub use batch::{ChunkMutations, WriteBatch};
pub use pending::{PendingWrite, WriteQueue};
pub use timer::DebounceTimer;
