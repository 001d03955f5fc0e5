//! Pending writes
//!
//! The in-memory queue of writes waiting for the next flush.

use serde_json::Value;

use crate::meta::now_millis;

/// A queued write
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub key: String,
    pub value: Value,

    /// Unix millis when the write was queued
    pub timestamp: u64,
}

impl PendingWrite {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp: now_millis(),
        }
    }
}

/// Writes queued since the last flush, oldest first
#[derive(Debug, Default)]
pub struct WriteQueue {
    writes: Vec<PendingWrite>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: PendingWrite) {
        self.writes.push(write);
    }

    /// Take every queued write, leaving the queue empty
    pub fn drain(&mut self) -> Vec<PendingWrite> {
        std::mem::take(&mut self.writes)
    }

    /// Put writes from a failed flush back in front of anything queued since
    pub fn restore(&mut self, mut writes: Vec<PendingWrite>) {
        writes.append(&mut self.writes);
        self.writes = writes;
    }

    /// Drop queued writes for `key`; returns how many were dropped
    pub fn discard_key(&mut self, key: &str) -> usize {
        let before = self.writes.len();
        self.writes.retain(|w| w.key != key);
        before - self.writes.len()
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}
