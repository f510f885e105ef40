//! Broadcast flood suppression.
//!
//! Broadcast frames are flooded to every neighbor and carry no hop count, so
//! loops are broken solely by remembering which `(message id, seq)` pairs a
//! node has already handled. The memory is bounded: once `capacity` keys are
//! held, the oldest keys are forgotten first.

use std::collections::{HashSet, VecDeque};

/// Default number of remembered fragment keys.
pub const DEFAULT_SEEN_CAPACITY: usize = 65_536;

/// Bounded FIFO set of processed broadcast fragments.
#[derive(Debug)]
pub struct SeenFragments {
    seen: HashSet<(String, u32)>,
    order: VecDeque<(String, u32)>,
    capacity: usize,
}

impl SeenFragments {
    /// Create a cache holding at most `capacity` keys (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a fragment. Returns `false` if it had already been recorded.
    pub fn insert(&mut self, id: &str, seq: u32) -> bool {
        let key = (id.to_string(), seq);
        if self.seen.contains(&key) {
            return false;
        }

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        true
    }

    /// Whether a fragment has been recorded.
    pub fn contains(&self, id: &str, seq: u32) -> bool {
        self.seen.contains(&(id.to_string(), seq))
    }

    /// Number of remembered keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for SeenFragments {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}
