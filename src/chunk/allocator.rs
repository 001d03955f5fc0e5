//! Chunk Allocator
//!
//! First-fit placement over a fixed range of chunk ids.

use std::collections::HashMap;

use serde_json::Value;

use crate::backend::{utf16_len, StorageBackend};
use crate::codec::Codec;
use crate::config::Config;
use crate::error::{Result, StoreError};

use super::{Chunk, ChunkId};

/// Picks the chunk a new entry goes into
#[derive(Debug, Clone, Copy)]
pub struct ChunkAllocator {
    /// Max stored chunk length (UTF-16 code units)
    chunk_size: usize,

    /// Chunk ids are `0..max_chunks`
    max_chunks: u32,
}

impl ChunkAllocator {
    pub fn new(chunk_size: usize, max_chunks: u32) -> Self {
        Self {
            chunk_size,
            max_chunks,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.chunk_size, config.max_chunks)
    }

    /// Size of `{"key":value}` serialized, in UTF-16 code units
    pub fn estimate(key: &str, value: &Value) -> Result<usize> {
        let key_json = serde_json::to_string(key)?;
        let value_json = serde_json::to_string(value)?;
        // braces + colon
        Ok(utf16_len(&key_json) + utf16_len(&value_json) + 3)
    }

    /// Whether an entry of `estimate` fits on top of `current`
    pub fn fits(&self, current: usize, estimate: usize) -> bool {
        current + estimate < self.chunk_size
    }

    /// First chunk in `0..max_chunks` that is missing or has room.
    /// Chunks that do not decode are passed over.
    ///
    /// Fails with `CapacityExhausted` when every slot is full.
    pub fn find_or_create(&self, sizes: &mut ChunkSizes<'_>, estimate: usize) -> Result<ChunkId> {
        for n in 0..self.max_chunks {
            let id = ChunkId(n);
            match sizes.slot(id)? {
                ChunkSlot::Missing => return Ok(id),
                ChunkSlot::Used(current) if self.fits(current, estimate) => return Ok(id),
                ChunkSlot::Used(_) | ChunkSlot::Unreadable => continue,
            }
        }

        Err(StoreError::CapacityExhausted {
            max_chunks: self.max_chunks,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_chunks(&self) -> u32 {
        self.max_chunks
    }
}

/// What a placement pass knows about one chunk slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSlot {
    /// Not stored yet; always accepts an entry
    Missing,

    /// Projected size in UTF-16 code units
    Used(usize),

    /// Stored but does not decode; never chosen for placement
    Unreadable,
}

/// Projected chunk sizes for one placement pass.
///
/// Physical sizes are read lazily from the backend; entries planned during
/// the pass are added on top so one batch cannot overfill a chunk.
pub struct ChunkSizes<'a> {
    backend: &'a dyn StorageBackend,
    prefix: &'a str,
    codec: &'a Codec,
    compress: bool,
    slots: HashMap<ChunkId, ChunkSlot>,
}

impl<'a> ChunkSizes<'a> {
    pub fn new(
        backend: &'a dyn StorageBackend,
        prefix: &'a str,
        codec: &'a Codec,
        compress: bool,
    ) -> Self {
        Self {
            backend,
            prefix,
            codec,
            compress,
            slots: HashMap::new(),
        }
    }

    /// Current state of chunk `id`, read from the backend on first use
    pub fn slot(&mut self, id: ChunkId) -> Result<ChunkSlot> {
        if let Some(slot) = self.slots.get(&id) {
            return Ok(*slot);
        }

        let slot = match self.backend.get_item(&id.storage_key(self.prefix))? {
            None => ChunkSlot::Missing,
            Some(stored) => match Chunk::decode(id, &stored, self.codec, self.compress) {
                Ok(_) => ChunkSlot::Used(utf16_len(&stored)),
                Err(e) => {
                    tracing::warn!("Skipping unreadable chunk {} for placement: {}", id, e);
                    ChunkSlot::Unreadable
                }
            },
        };
        self.slots.insert(id, slot);
        Ok(slot)
    }

    /// Account for `amount` more units planned into chunk `id`
    pub fn reserve(&mut self, id: ChunkId, amount: usize) -> Result<()> {
        let projected = match self.slot(id)? {
            ChunkSlot::Missing => ChunkSlot::Used(amount),
            ChunkSlot::Used(current) => ChunkSlot::Used(current + amount),
            ChunkSlot::Unreadable => ChunkSlot::Unreadable,
        };
        self.slots.insert(id, projected);
        Ok(())
    }
}
