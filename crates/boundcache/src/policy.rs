//! Count-limit enforcement
//!
//! Victims are taken oldest-first from the [`RecencyIndex`] until the number
//! of tracked keys is back within the limit. A limit of 0 means unbounded.

use std::convert::Infallible;

use crate::recency::RecencyIndex;

/// Maximum entry count plus the eviction pass that enforces it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityPolicy {
    limit: usize,
}

impl CapacityPolicy {
    /// Create a policy with the given limit (0 = unbounded)
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Current limit
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Replace the limit. The caller runs the eviction pass.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Whether the limit is 0
    pub fn is_unbounded(&self) -> bool {
        self.limit == 0
    }

    /// Number of keys that must go for `index` to fit
    pub fn overflow(&self, index: &RecencyIndex) -> usize {
        if self.is_unbounded() {
            0
        } else {
            index.len().saturating_sub(self.limit)
        }
    }

    /// Drop the oldest keys from `index` until it fits, returning them
    /// oldest first. Returns an empty list when already within the limit.
    pub fn evict(&self, index: &mut RecencyIndex) -> Vec<String> {
        match self.evict_with(index, |_| Ok::<(), Infallible>(())) {
            Ok(victims) => victims,
            Err(never) => match never {},
        }
    }

    /// Like [`evict`](Self::evict), but calls `remove_backing` for each
    /// victim before it leaves the index.
    ///
    /// A victim whose backing removal fails stays in the index and is
    /// skipped; the pass moves on to the next-oldest key. The first failure
    /// is returned once the pass is over.
    pub fn evict_with<E, F>(&self, index: &mut RecencyIndex, mut remove_backing: F) -> Result<Vec<String>, E>
    where
        F: FnMut(&str) -> Result<(), E>,
    {
        let mut victims = Vec::with_capacity(self.overflow(index));
        let mut first_error = None;
        let mut skipped = 0;

        while self.overflow(index) > 0 {
            // Failed victims stay at the front, so skip past them
            let victim = match index.oldest_first().nth(skipped) {
                Some(key) => key.to_owned(),
                None => break,
            };

            match remove_backing(&victim) {
                Ok(()) => {
                    index.remove(&victim);
                    victims.push(victim);
                }
                Err(e) => {
                    skipped += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(victims),
        }
    }
}
