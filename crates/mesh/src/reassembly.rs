//! Reassembly of fragmented messages.
//!
//! Buffers are keyed by message id and complete exactly when `total`
//! distinct sequence numbers have arrived; arrival order does not matter.
//! Buffers that stay incomplete longer than the configured TTL are evicted
//! the next time any fragment is inserted.

use crate::error::{MeshError, MeshResult};
use crate::frame::TransportFrame;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct PartialMessage {
    total: u32,
    chunks: BTreeMap<u32, String>,
    first_seen: Instant,
}

/// Per-node store of partially received messages.
#[derive(Debug)]
pub struct ReassemblyBuffers {
    pending: HashMap<String, PartialMessage>,
    ttl: Duration,
}

impl ReassemblyBuffers {
    /// Create an empty store evicting incomplete messages after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            ttl,
        }
    }

    /// Add a fragment. Returns the concatenated message once complete.
    pub fn insert(&mut self, frame: &TransportFrame) -> MeshResult<Option<String>> {
        self.evict_stale(Instant::now());

        if !frame.is_well_formed() {
            return Err(MeshError::InvalidFrame(format!(
                "message {} has seq {} of total {}",
                frame.id, frame.seq, frame.total
            )));
        }

        let entry = self
            .pending
            .entry(frame.id.clone())
            .or_insert_with(|| PartialMessage {
                total: frame.total,
                chunks: BTreeMap::new(),
                first_seen: Instant::now(),
            });

        if entry.total != frame.total {
            return Err(MeshError::InvalidFrame(format!(
                "message {} announced {} fragments, frame says {}",
                frame.id, entry.total, frame.total
            )));
        }

        entry.chunks.insert(frame.seq, frame.data.clone());
        if entry.chunks.len() < entry.total as usize {
            return Ok(None);
        }

        Ok(self
            .pending
            .remove(&frame.id)
            .map(|complete| complete.chunks.into_values().collect()))
    }

    /// Drop buffers older than the TTL, returning how many were dropped.
    pub fn evict_stale(&mut self, now: Instant) -> usize {
        let before = self.pending.len();
        let ttl = self.ttl;
        self.pending
            .retain(|_, partial| now.duration_since(partial.first_seen) <= ttl);
        let evicted = before - self.pending.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted stale reassembly buffers");
        }
        evicted
    }

    /// Number of incomplete messages held.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
