//! Chunk contents
//!
//! A decoded chunk: the JSON object of logical keys it holds.

use serde_json::{Map, Value};

use crate::backend::{utf16_len, StorageBackend};
use crate::codec::Codec;
use crate::error::{Result, StoreError};

use super::ChunkId;

/// A decoded chunk
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    id: ChunkId,
    entries: Map<String, Value>,
}

impl Chunk {
    /// A chunk with no entries (not yet stored)
    pub fn empty(id: ChunkId) -> Self {
        Self {
            id,
            entries: Map::new(),
        }
    }

    /// Load chunk `id`.
    ///
    /// Returns:
    /// - `Ok(Some(chunk))`: chunk exists and decodes
    /// - `Ok(None)`: chunk does not exist physically
    /// - `Err(CorruptChunk)`: chunk exists but is not a JSON object
    pub fn load(
        backend: &dyn StorageBackend,
        prefix: &str,
        id: ChunkId,
        codec: &Codec,
        compress: bool,
    ) -> Result<Option<Self>> {
        match backend.get_item(&id.storage_key(prefix))? {
            Some(stored) => Self::decode(id, &stored, codec, compress).map(Some),
            None => Ok(None),
        }
    }

    /// Load chunk `id`, or an empty chunk if it does not exist yet
    pub fn load_or_empty(
        backend: &dyn StorageBackend,
        prefix: &str,
        id: ChunkId,
        codec: &Codec,
        compress: bool,
    ) -> Result<Self> {
        Ok(Self::load(backend, prefix, id, codec, compress)?.unwrap_or_else(|| Self::empty(id)))
    }

    /// Decode a stored chunk string
    pub fn decode(id: ChunkId, stored: &str, codec: &Codec, compress: bool) -> Result<Self> {
        let mut last_error = None;
        for candidate in codec.decode_candidates(stored, compress) {
            match serde_json::from_str::<Map<String, Value>>(&candidate) {
                Ok(entries) => return Ok(Self { id, entries }),
                Err(e) => last_error = Some(e),
            }
        }

        Err(StoreError::CorruptChunk {
            chunk: id.to_string(),
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "undecodable payload".to_string()),
        })
    }

    /// Serialize, encode and write the chunk.
    ///
    /// Returns the stored length in UTF-16 code units.
    pub fn store(
        &self,
        backend: &dyn StorageBackend,
        prefix: &str,
        codec: &Codec,
        compress: bool,
    ) -> Result<usize> {
        let serialized = serde_json::to_string(&self.entries)?;
        let encoded = codec.encode(&serialized, compress);
        backend.set_item(&self.id.storage_key(prefix), &encoded)?;
        Ok(utf16_len(&encoded))
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }
}
