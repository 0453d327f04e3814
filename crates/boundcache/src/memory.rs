//! In-process cache store

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use ahash::RandomState;
use parking_lot::Mutex;
use tracing::debug;

use crate::cache::Cache;
use crate::error::Result;
use crate::policy::CapacityPolicy;
use crate::pressure::{MemoryPressureSource, Subscription};
use crate::recency::RecencyIndex;
use crate::stats::CacheStats;

/// Everything guarded by the cache lock
struct State<V> {
    entries: HashMap<String, V, RandomState>,
    index: RecencyIndex,
    policy: CapacityPolicy,
}

impl<V> State<V> {
    fn evict(&mut self, stats: &CacheStats) {
        let victims = self.policy.evict(&mut self.index);
        for key in &victims {
            self.entries.remove(key);
        }
        if !victims.is_empty() {
            debug!(evicted = victims.len(), limit = self.policy.limit(), "memory cache eviction");
            stats.record_evictions(victims.len());
        }
    }

    fn clear(&mut self, stats: &CacheStats) {
        stats.record_removals(self.entries.len());
        self.entries.clear();
        self.index.clear();
    }
}

/// Volatile LRU cache holding values in a hash table
///
/// One mutex guards the table, the recency index, and the limit; every
/// operation holds it for its full duration, eviction included.
pub struct MemoryCache<V> {
    state: Arc<Mutex<State<V>>>,
    stats: Arc<CacheStats>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl<V> MemoryCache<V> {
    /// Create an unbounded cache
    pub fn new() -> Self {
        Self::with_count_limit(0)
    }

    /// Create a cache holding at most `limit` entries (0 = unbounded)
    pub fn with_count_limit(limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries: HashMap::with_hasher(RandomState::new()),
                index: RecencyIndex::new(),
                policy: CapacityPolicy::new(limit),
            })),
            stats: Arc::new(CacheStats::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Store a value, making `key` the most recently written entry
    pub fn put(&self, key: &str, value: V) {
        let mut state = self.state.lock();
        state.entries.insert(key.to_owned(), value);
        state.index.bump(key);
        self.stats.record_insert();
        state.evict(&self.stats);
    }

    /// Remove `key` if present
    pub fn remove(&self, key: &str) {
        let mut state = self.state.lock();
        if state.entries.remove(key).is_some() {
            state.index.remove(key);
            self.stats.record_removals(1);
        }
    }

    /// Remove every entry
    pub fn remove_all(&self) {
        self.state.lock().clear(&self.stats);
    }

    /// Check whether `key` has a value
    pub fn has(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Number of live entries
    pub fn count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Current limit (0 = unbounded)
    pub fn count_limit(&self) -> usize {
        self.state.lock().policy.limit()
    }

    /// Change the limit and evict down to it
    pub fn set_count_limit(&self, limit: usize) {
        let mut state = self.state.lock();
        state.policy.set_limit(limit);
        state.evict(&self.stats);
    }

    /// Keys from least to most recently written
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().index.oldest_first().map(str::to_owned).collect()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Clear this cache whenever `source` signals low memory
    ///
    /// The registration lasts until the cache is dropped or
    /// [`stop_watching_memory_pressure`](Self::stop_watching_memory_pressure)
    /// is called.
    pub fn watch_memory_pressure<S>(&self, source: &S)
    where
        S: MemoryPressureSource + ?Sized,
        V: Send + 'static,
    {
        let state: Weak<Mutex<State<V>>> = Arc::downgrade(&self.state);
        let stats = Arc::clone(&self.stats);

        let subscription = source.subscribe(Arc::new(move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.lock();
                debug!(dropped = state.entries.len(), "clearing memory cache on pressure signal");
                state.clear(&stats);
            }
        }));

        self.subscriptions.lock().push(subscription);
    }

    /// Drop every pressure registration made by this cache
    pub fn stop_watching_memory_pressure(&self) {
        self.subscriptions.lock().clear();
    }
}

impl<V: Clone> MemoryCache<V> {
    /// Fetch a copy of the value for `key`. Does not change recency.
    pub fn get(&self, key: &str) -> Option<V> {
        let value = self.state.lock().entries.get(key).cloned();
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryCache")
            .field("count", &state.entries.len())
            .field("count_limit", &state.policy.limit())
            .finish()
    }
}

impl<V: Clone> Cache for MemoryCache<V> {
    type Value = V;

    fn put(&self, key: &str, value: V) -> Result<()> {
        MemoryCache::put(self, key, value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(MemoryCache::get(self, key))
    }

    fn remove(&self, key: &str) -> Result<()> {
        MemoryCache::remove(self, key);
        Ok(())
    }

    fn remove_all(&self) -> Result<()> {
        MemoryCache::remove_all(self);
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        MemoryCache::has(self, key)
    }

    fn count(&self) -> usize {
        MemoryCache::count(self)
    }

    fn count_limit(&self) -> usize {
        MemoryCache::count_limit(self)
    }

    fn set_count_limit(&self, limit: usize) -> Result<()> {
        MemoryCache::set_count_limit(self, limit);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        MemoryCache::keys(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::PressureNotifier;

    #[test]
    fn test_initial_state() {
        let cache: MemoryCache<String> = MemoryCache::new();

        assert_eq!(cache.count(), 0);
        assert_eq!(cache.count_limit(), 0);
    }

    #[test]
    fn test_put_get() {
        let cache = MemoryCache::new();
        cache.put("hoge", "piyo".to_string());

        assert_eq!(cache.get("hoge"), Some("piyo".to_string()));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_set_none_removes() {
        let cache = MemoryCache::new();
        Cache::set(&cache, "hoge", Some("piyo")).unwrap();
        assert!(cache.has("hoge"));

        Cache::set(&cache, "hoge", None).unwrap();
        assert!(!cache.has("hoge"));
    }

    #[test]
    fn test_count_and_remove() {
        let cache = MemoryCache::new();
        cache.put("hoge", 1);
        cache.put("piyo", 2);
        assert_eq!(cache.count(), 2);

        cache.remove("hoge");
        assert_eq!(cache.count(), 1);

        cache.remove("piyo");
        cache.remove("piyo");
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.stats().removals(), 2);
    }

    #[test]
    fn test_count_limit() {
        let cache = MemoryCache::with_count_limit(2);

        cache.put("0", "0");
        cache.put("1", "1");
        cache.put("2", "2");

        assert_eq!(cache.count(), 2);
        assert!(!cache.has("0"));
        assert!(cache.has("1"));
        assert!(cache.has("2"));
        assert_eq!(cache.stats().evictions(), 1);
    }

    #[test]
    fn test_get_does_not_refresh() {
        let cache = MemoryCache::with_count_limit(2);

        cache.put("a", 1);
        cache.put("b", 2);
        cache.get("a");
        cache.put("c", 3);

        assert!(!cache.has("a"));
        assert_eq!(cache.keys(), vec!["b", "c"]);
    }

    #[test]
    fn test_rewrite_refreshes() {
        let cache = MemoryCache::with_count_limit(2);

        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("a", 10);
        assert_eq!(cache.count(), 2);

        cache.put("c", 3);

        assert_eq!(cache.get("a"), Some(10));
        assert!(!cache.has("b"));
    }

    #[test]
    fn test_lower_limit_evicts_now() {
        let cache = MemoryCache::new();
        for i in 0..10 {
            cache.put(&format!("key{}", i), i);
        }

        cache.set_count_limit(3);

        assert_eq!(cache.count(), 3);
        assert_eq!(cache.keys(), vec!["key7", "key8", "key9"]);
    }

    #[test]
    fn test_remove_all_twice() {
        let cache = MemoryCache::new();
        cache.put("a", 1);

        cache.remove_all();
        cache.remove_all();

        assert_eq!(cache.count(), 0);
        assert!(cache.keys().is_empty());
    }

    #[test]
    fn test_pressure_clears() {
        let notifier = PressureNotifier::new();
        let cache = MemoryCache::new();
        cache.watch_memory_pressure(&notifier);
        cache.put("a", 1);
        cache.put("b", 2);

        notifier.notify();

        assert_eq!(cache.count(), 0);
        cache.put("c", 3);
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let notifier = PressureNotifier::new();
        {
            let cache: MemoryCache<i32> = MemoryCache::new();
            cache.watch_memory_pressure(&notifier);
            assert_eq!(notifier.subscriber_count(), 1);
        }
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_stop_watching() {
        let notifier = PressureNotifier::new();
        let cache = MemoryCache::new();
        cache.watch_memory_pressure(&notifier);
        cache.stop_watching_memory_pressure();
        cache.put("a", 1);

        assert_eq!(notifier.notify(), 0);
        assert_eq!(cache.count(), 1);
    }
}
