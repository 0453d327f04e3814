//! Write-order recency tracking
//!
//! Every write assigns the key the next value of a monotonically increasing
//! sequence counter. Two maps are kept in step:
//! - **by_key**: key -> sequence, for O(1) membership and replacement
//! - **by_seq**: sequence -> key, ordered, for the oldest-first walk
//!
//! Reads never touch the index; recency is write-driven.

use std::collections::{BTreeMap, HashMap};
use ahash::RandomState;

/// Total order over cached keys by time of last write
#[derive(Debug, Default)]
pub struct RecencyIndex {
    by_key: HashMap<String, u64, RandomState>,
    by_seq: BTreeMap<u64, String>,
    next: u64,
}

impl RecencyIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as the most recently written key, inserting it if absent
    ///
    /// Returns the sequence number assigned to the key.
    pub fn bump(&mut self, key: &str) -> u64 {
        if self.next == u64::MAX {
            self.renumber();
        }

        let seq = self.next;
        self.next += 1;

        match self.by_key.get_mut(key) {
            Some(old) => {
                // Rewrite: move to the back, reuse the owned key
                let owned = self.by_seq.remove(&*old).unwrap_or_else(|| key.to_owned());
                *old = seq;
                self.by_seq.insert(seq, owned);
            }
            None => {
                self.by_key.insert(key.to_owned(), seq);
                self.by_seq.insert(seq, key.to_owned());
            }
        }

        seq
    }

    /// Forget `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.by_key.remove(key) {
            Some(seq) => {
                self.by_seq.remove(&seq);
                true
            }
            None => false,
        }
    }

    /// Check whether `key` is tracked
    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Sequence number currently assigned to `key`
    pub fn sequence(&self, key: &str) -> Option<u64> {
        self.by_key.get(key).copied()
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Check if no keys are tracked
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Least recently written key
    pub fn oldest(&self) -> Option<&str> {
        self.by_seq.values().next().map(String::as_str)
    }

    /// Keys ordered from least to most recently written
    ///
    /// The iterator borrows the index; call again to restart the walk.
    pub fn oldest_first(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_seq.values().map(String::as_str)
    }

    /// Drop every key and restart the counter
    pub fn clear(&mut self) {
        self.by_key.clear();
        self.by_seq.clear();
        self.next = 0;
    }

    /// Reassign sequence numbers 0..N-1 keeping the current relative order
    pub fn renumber(&mut self) {
        let ordered = std::mem::take(&mut self.by_seq);

        for (seq, key) in (0u64..).zip(ordered.into_values()) {
            if let Some(slot) = self.by_key.get_mut(&key) {
                *slot = seq;
            }
            self.by_seq.insert(seq, key);
        }

        self.next = self.by_seq.len() as u64;
    }

    #[cfg(test)]
    pub(crate) fn with_next_sequence(next: u64) -> Self {
        Self {
            next,
            ..Self::default()
        }
    }
}
