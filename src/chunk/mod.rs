//! Chunk Module
//!
//! Physically bounded storage blocks holding many logical keys.
//!
//! ## Responsibilities
//! - Name chunks (`{prefix}data_N`)
//! - Load/decode and encode/store whole chunks
//! - Pick a chunk with room for a new entry (first fit, fixed ceiling)
//!
//! ## Stored Form
//! ```text
//! {prefix}data_N  =  codec( {"key1": value1, "key2": value2, ...} )
//! ```
//! Chunks are never removed; deleting a key leaves the chunk in place.

mod allocator;
mod block;

pub use allocator::{ChunkAllocator, ChunkSizes, ChunkSlot};
pub use block::Chunk;

use std::fmt;

/// Sequential chunk number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(pub u32);

impl ChunkId {
    const MARKER: &'static str = "data_";

    /// Physical key of this chunk under `prefix`
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{}{}{}", prefix, Self::MARKER, self.0)
    }

    /// "vl_data_42" → Some(ChunkId(42))
    pub fn parse(storage_key: &str, prefix: &str) -> Option<Self> {
        let digits = storage_key.strip_prefix(prefix)?.strip_prefix(Self::MARKER)?;
        let id: u32 = digits.parse().ok()?;
        // "data_07" is a different physical key than "data_7"
        if id.to_string() != digits {
            return None;
        }
        Some(Self(id))
    }

    /// Prefix shared by every chunk key under `prefix`
    pub fn key_prefix(prefix: &str) -> String {
        format!("{}{}", prefix, Self::MARKER)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::MARKER, self.0)
    }
}
