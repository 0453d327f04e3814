//! The operations every store offers

use crate::error::Result;

/// Count-bounded key/value cache
///
/// Keys are strings. Recency is driven by writes only: `put` makes a key the
/// most recent, `get` leaves the order alone. With a non-zero count limit,
/// every mutating call returns with `count() <= count_limit()`.
///
/// Implementations synchronize internally, so all methods take `&self`.
pub trait Cache {
    /// Stored value type
    type Value;

    /// Store `value` under `key`, replacing any previous value and evicting
    /// the least recently written entries if the limit is exceeded
    fn put(&self, key: &str, value: Self::Value) -> Result<()>;

    /// Fetch the value for `key`. `Ok(None)` means absent.
    fn get(&self, key: &str) -> Result<Option<Self::Value>>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> Result<()>;

    /// Remove every entry
    fn remove_all(&self) -> Result<()>;

    /// Whether `key` currently has a value
    fn has(&self, key: &str) -> bool;

    /// Number of live entries
    fn count(&self) -> usize;

    /// Maximum entry count; 0 means unbounded
    fn count_limit(&self) -> usize;

    /// Change the limit, evicting immediately if the cache is now over it
    fn set_count_limit(&self, limit: usize) -> Result<()>;

    /// Snapshot of the keys, least recently written first
    fn keys(&self) -> Vec<String>;

    /// Write `Some(value)` or remove on `None`
    fn set(&self, key: &str, value: Option<Self::Value>) -> Result<()> {
        match value {
            Some(value) => self.put(key, value),
            None => self.remove(key),
        }
    }

    /// Whether the cache holds no entries
    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
