//! Flush planning
//!
//! Turns a list of writes into per-chunk mutations.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::chunk::{ChunkAllocator, ChunkId, ChunkSizes, ChunkSlot};
use crate::error::{Result, StoreError};
use crate::index::Index;

use super::PendingWrite;

/// Everything one chunk needs to have applied
#[derive(Debug, Default, PartialEq)]
pub struct ChunkMutations {
    /// Keys to insert or overwrite
    pub upserts: Vec<(String, Value)>,

    /// Keys that moved out of this chunk
    pub removals: Vec<String>,
}

/// A flush plan: mutations grouped by chunk
#[derive(Debug, Default)]
pub struct WriteBatch {
    chunks: BTreeMap<ChunkId, ChunkMutations>,

    /// Final chunk of every written key, in write order
    placements: Vec<(String, ChunkId)>,

    rejected: Vec<String>,
}

impl WriteBatch {
    /// Collapse writes to one per key (last value wins).
    ///
    /// Keys keep the position of their first write.
    pub fn coalesce(writes: Vec<PendingWrite>) -> Vec<(String, Value)> {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut latest: Vec<(String, Value)> = Vec::with_capacity(writes.len());

        for PendingWrite { key, value, .. } in writes {
            match positions.get(&key) {
                Some(&pos) => latest[pos].1 = value,
                None => {
                    positions.insert(key.clone(), latest.len());
                    latest.push((key, value));
                }
            }
        }

        latest
    }

    /// Resolve the target chunk of every write.
    ///
    /// A key already in the index stays in its chunk while the new value
    /// fits there; otherwise it is placed by the allocator and removed from
    /// its old chunk. A key whose old chunk is unreadable is placed afresh
    /// and the old chunk is left alone.
    ///
    /// A write no chunk can take is left out of the plan and listed in
    /// `rejected`; the other writes are planned as usual.
    pub fn plan(
        writes: Vec<(String, Value)>,
        index: &Index,
        prefix: &str,
        allocator: &ChunkAllocator,
        sizes: &mut ChunkSizes<'_>,
    ) -> Result<Self> {
        let mut batch = Self::default();

        for (key, value) in writes {
            let estimate = ChunkAllocator::estimate(&key, &value)?;
            let current = index.chunk_of(&key, prefix);

            let current_slot = match current {
                Some(id) => Some((id, sizes.slot(id)?)),
                None => None,
            };
            let in_place = match current_slot {
                Some((id, ChunkSlot::Used(size))) if allocator.fits(size, estimate) => Some(id),
                Some((id, ChunkSlot::Missing)) if allocator.fits(0, estimate) => Some(id),
                _ => None,
            };

            let target = match in_place {
                Some(id) => id,
                None => match allocator.find_or_create(sizes, estimate) {
                    Ok(id) => id,
                    Err(e @ StoreError::CapacityExhausted { .. }) => {
                        tracing::error!("Dropping write of {}: {}", key, e);
                        batch.rejected.push(key);
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };
            sizes.reserve(target, estimate)?;

            if let Some((old, ChunkSlot::Used(_))) = current_slot.filter(|(old, _)| *old != target) {
                tracing::debug!("Relocating {} from {} to {}", key, old, target);
                batch.chunks.entry(old).or_default().removals.push(key.clone());
            }

            batch.placements.push((key.clone(), target));
            batch.chunks.entry(target).or_default().upserts.push((key, value));
        }

        Ok(batch)
    }

    pub fn placements(&self) -> &[(String, ChunkId)] {
        &self.placements
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Keys left out because no chunk could take them
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn into_parts(self) -> (BTreeMap<ChunkId, ChunkMutations>, Vec<(String, ChunkId)>, Vec<String>) {
        (self.chunks, self.placements, self.rejected)
    }
}
