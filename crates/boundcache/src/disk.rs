//! Filesystem-backed cache store
//!
//! Directory layout:
//! - `<root>/<key>`: one file per entry, holding the codec's bytes verbatim
//! - `<root>/.tmp*`: in-flight writes, renamed over the entry file when complete
//!
//! Nothing else is persisted. Every write stamps its file with a modification
//! time strictly later than the previous write's, and on open recency is
//! rebuilt from those times (oldest first, ties broken by file name).

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use url::Url;

use crate::cache::Cache;
use crate::codec::{Codec, JsonCodec};
use crate::error::{Error, Result};
use crate::policy::CapacityPolicy;
use crate::recency::RecencyIndex;
use crate::stats::CacheStats;

/// Application identifier used for the default temp-dir location
pub const DEFAULT_APP_ID: &str = "boundcache";

/// Where a [`DiskCache`] lives and how many entries it keeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCacheConfig {
    directory: PathBuf,
    count_limit: usize,
}

impl DiskCacheConfig {
    /// Use `directory` as the cache root
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            count_limit: 0,
        }
    }

    /// Use the local directory named by a `file://` URL
    pub fn from_url(url: &Url) -> Result<Self> {
        if url.scheme() != "file" {
            return Err(Error::InvalidDirectoryUrl(url.to_string()));
        }
        let directory = url
            .to_file_path()
            .map_err(|_| Error::InvalidDirectoryUrl(url.to_string()))?;
        Ok(Self::new(directory))
    }

    /// Use `<system temp dir>/<app_id>`
    pub fn in_temp_dir(app_id: &str) -> Self {
        Self::new(std::env::temp_dir().join(app_id))
    }

    /// Set the entry limit (0 = unbounded)
    pub fn count_limit(mut self, limit: usize) -> Self {
        self.count_limit = limit;
        self
    }

    /// Cache root directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Configured entry limit
    pub fn limit(&self) -> usize {
        self.count_limit
    }
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self::in_temp_dir(DEFAULT_APP_ID)
    }
}

/// Everything guarded by the cache lock
struct State {
    index: RecencyIndex,
    policy: CapacityPolicy,
    last_stamp: SystemTime,
}

impl State {
    /// Modification time for the next write: now, unless that would not
    /// sort after the previous write
    fn next_stamp(&self) -> SystemTime {
        SystemTime::now().max(self.last_stamp + STAMP_STEP)
    }
}

/// Minimum gap between the modification times of consecutive writes
const STAMP_STEP: Duration = Duration::from_micros(1);

/// Durable LRU cache storing one file per key
///
/// Keys are used verbatim as file names, so they must not contain path
/// separators, and keys starting with `.` are not recovered on reopen.
/// A single mutex serializes every operation, including the file I/O; two
/// instances must not share a directory.
pub struct DiskCache<V, C = JsonCodec<V>> {
    directory: PathBuf,
    codec: C,
    state: Mutex<State>,
    stats: CacheStats,
    _marker: PhantomData<fn() -> V>,
}

impl<V> DiskCache<V, JsonCodec<V>>
where
    V: Serialize + DeserializeOwned,
{
    /// Open (creating if needed) a JSON-encoded cache at `directory`
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        Self::with_config(DiskCacheConfig::new(directory), JsonCodec::new())
    }

    /// Open a JSON-encoded cache at the directory named by a `file://` URL
    pub fn open_url(url: &Url) -> Result<Self> {
        Self::with_config(DiskCacheConfig::from_url(url)?, JsonCodec::new())
    }

    /// Open a JSON-encoded cache under the system temp dir
    pub fn open_in_temp(app_id: &str) -> Result<Self> {
        Self::with_config(DiskCacheConfig::in_temp_dir(app_id), JsonCodec::new())
    }

    /// Open a JSON-encoded cache at [`DiskCacheConfig::default`]
    pub fn open_default() -> Result<Self> {
        Self::with_config(DiskCacheConfig::default(), JsonCodec::new())
    }
}

impl<V, C: Codec<V>> DiskCache<V, C> {
    /// Open (creating if needed) a cache at `directory` using `codec`
    pub fn open_with_codec<P: AsRef<Path>>(directory: P, codec: C) -> Result<Self> {
        Self::with_config(DiskCacheConfig::new(directory), codec)
    }

    /// Create the directory if missing, rebuild recency from the files
    /// already there, and apply the configured limit
    ///
    /// # Arguments
    /// * `config` - Root directory and entry limit
    /// * `codec` - Value serialization
    ///
    /// # Returns
    /// * `Result<DiskCache>` - Ready cache, or the first failure
    pub fn with_config(config: DiskCacheConfig, codec: C) -> Result<Self> {
        let DiskCacheConfig {
            directory,
            count_limit,
        } = config;

        fs::create_dir_all(&directory).map_err(|source| Error::DirectoryCreationFailed {
            path: directory.clone(),
            source,
        })?;

        let mut index = RecencyIndex::new();
        let mut last_stamp = SystemTime::UNIX_EPOCH;
        for (modified, key) in scan_directory(&directory)? {
            index.bump(&key);
            last_stamp = last_stamp.max(modified);
        }
        debug!(directory = %directory.display(), entries = index.len(), "opened disk cache");

        let cache = Self {
            directory,
            codec,
            state: Mutex::new(State {
                index,
                policy: CapacityPolicy::new(count_limit),
                last_stamp,
            }),
            stats: CacheStats::new(),
            _marker: PhantomData,
        };

        {
            let mut state = cache.state.lock();
            cache.evict_locked(&mut state)?;
        }

        Ok(cache)
    }

    /// Encode `value` and atomically replace the file for `key`
    ///
    /// `key` becomes the most recently written entry; if the limit is now
    /// exceeded the oldest entries' files are deleted before returning.
    pub fn put(&self, key: &str, value: &V) -> Result<()> {
        let bytes = self.codec.encode(value)?;

        let mut state = self.state.lock();
        let stamp = state.next_stamp();
        self.write_file(key, &bytes, stamp)?;
        state.last_stamp = stamp;
        state.index.bump(key);
        self.stats.record_insert();

        self.evict_locked(&mut state)
    }

    /// Read and decode the value for `key`
    ///
    /// Unknown keys return `Ok(None)` without touching the disk. A file that
    /// has disappeared behind the cache's back also reads as absent.
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        let bytes = {
            let state = self.state.lock();
            if !state.index.contains(key) {
                self.stats.record_miss();
                return Ok(None);
            }

            let path = self.path_for(key);
            match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(key, "cache file missing for indexed key");
                    self.stats.record_miss();
                    return Ok(None);
                }
                Err(e) => return Err(Error::io(path, e)),
            }
        };

        let value = self.codec.decode(&bytes)?;
        self.stats.record_hit();
        Ok(Some(value))
    }

    /// Delete the file for `key`. Unknown keys are a no-op.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.index.contains(key) {
            return Ok(());
        }

        self.delete_file(key)?;
        state.index.remove(key);
        self.stats.record_removals(1);
        Ok(())
    }

    /// Delete every entry file, oldest first
    ///
    /// Stops at the first failure. Entries deleted before it stay deleted;
    /// the rest stay cached.
    pub fn remove_all(&self) -> Result<()> {
        let mut state = self.state.lock();
        let keys: Vec<String> = state.index.oldest_first().map(str::to_owned).collect();

        let mut removed = 0;
        let result = keys.iter().try_for_each(|key| {
            self.delete_file(key)?;
            state.index.remove(key);
            removed += 1;
            Ok::<(), Error>(())
        });

        self.stats.record_removals(removed);
        if result.is_ok() {
            state.index.clear();
        }
        result
    }

    /// Check whether `key` is cached
    pub fn has(&self, key: &str) -> bool {
        self.state.lock().index.contains(key)
    }

    /// Number of cached entries
    pub fn count(&self) -> usize {
        self.state.lock().index.len()
    }

    /// Current limit (0 = unbounded)
    pub fn count_limit(&self) -> usize {
        self.state.lock().policy.limit()
    }

    /// Change the limit and delete entries down to it
    pub fn set_count_limit(&self, limit: usize) -> Result<()> {
        let mut state = self.state.lock();
        state.policy.set_limit(limit);
        self.evict_locked(&mut state)
    }

    /// Keys from least to most recently written
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().index.oldest_first().map(str::to_owned).collect()
    }

    /// Cache root directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Delete the oldest files until the limit holds
    ///
    /// A file that cannot be deleted keeps its entry and the next-oldest one
    /// goes instead; the first such error is returned after the pass.
    fn evict_locked(&self, state: &mut State) -> Result<()> {
        let State { index, policy, .. } = state;

        let mut evicted = 0;
        let result = policy.evict_with(index, |key| match self.delete_file(key) {
            Ok(()) => {
                evicted += 1;
                Ok(())
            }
            Err(e) => {
                warn!(key, error = %e, "failed to evict cache file");
                Err(e)
            }
        });

        if evicted > 0 {
            debug!(evicted, limit = policy.limit(), "disk cache eviction");
            self.stats.record_evictions(evicted);
        }
        result.map(|_| ())
    }

    fn write_file(&self, key: &str, bytes: &[u8], modified: SystemTime) -> Result<()> {
        let path = self.path_for(key);

        let mut tmp = NamedTempFile::new_in(&self.directory).map_err(|e| Error::io(&self.directory, e))?;
        tmp.write_all(bytes).map_err(|e| Error::io(tmp.path(), e))?;
        tmp.as_file().sync_data().map_err(|e| Error::io(tmp.path(), e))?;
        let file = tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;

        // The data is in place; a missing stamp only affects order after reopen
        if let Err(e) = file.set_modified(modified) {
            warn!(path = %path.display(), error = %e, "failed to stamp cache file");
        }

        Ok(())
    }

    fn delete_file(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(path, e)),
        }
    }
}

/// List cache keys found in `directory` with their modification times,
/// oldest first
///
/// Only regular, non-hidden files with UTF-8 names count. A file whose
/// modification time cannot be read is treated as written now.
fn scan_directory(directory: &Path) -> Result<Vec<(SystemTime, String)>> {
    let entries = fs::read_dir(directory).map_err(|e| Error::io(directory, e))?;
    let now = SystemTime::now();
    let mut found: Vec<(SystemTime, String)> = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| Error::io(directory, e))?;

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(name = ?raw, "skipping cache file with non-UTF-8 name");
                continue;
            }
        };
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable cache entry");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }

        found.push((meta.modified().unwrap_or(now), name));
    }

    found.sort();
    Ok(found)
}

impl<V, C> fmt::Debug for DiskCache<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DiskCache")
            .field("directory", &self.directory)
            .field("count", &state.index.len())
            .field("count_limit", &state.policy.limit())
            .finish()
    }
}

impl<V, C: Codec<V>> Cache for DiskCache<V, C> {
    type Value = V;

    fn put(&self, key: &str, value: V) -> Result<()> {
        DiskCache::put(self, key, &value)
    }

    fn get(&self, key: &str) -> Result<Option<V>> {
        DiskCache::get(self, key)
    }

    fn remove(&self, key: &str) -> Result<()> {
        DiskCache::remove(self, key)
    }

    fn remove_all(&self) -> Result<()> {
        DiskCache::remove_all(self)
    }

    fn has(&self, key: &str) -> bool {
        DiskCache::has(self, key)
    }

    fn count(&self) -> usize {
        DiskCache::count(self)
    }

    fn count_limit(&self) -> usize {
        DiskCache::count_limit(self)
    }

    fn set_count_limit(&self, limit: usize) -> Result<()> {
        DiskCache::set_count_limit(self, limit)
    }

    fn keys(&self) -> Vec<String> {
        DiskCache::keys(self)
    }
}
