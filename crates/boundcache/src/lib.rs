//! # boundcache
//!
//! Count-bounded key/value cache with least-recently-written eviction.
//!
//! ## Architecture
//! - **RecencyIndex**: sequence-numbered write order over live keys
//! - **CapacityPolicy**: evicts oldest-first once the count limit is exceeded
//! - **MemoryCache**: volatile store, values in a hash table
//! - **DiskCache**: durable store, one file per key, recency rebuilt from
//!   modification times on open
//! - **Cache**: the operations both stores share
//!
//! Each store owns a single lock; every operation, eviction included,
//! runs under it.

#![warn(missing_docs)]

mod cache;
mod codec;
mod disk;
mod error;
mod memory;
mod policy;
mod pressure;
mod recency;
mod stats;

pub use cache::Cache;
pub use codec::{Codec, JsonCodec, RawCodec};
pub use disk::{DiskCache, DiskCacheConfig, DEFAULT_APP_ID};
pub use error::{Error, Result};
pub use memory::MemoryCache;
pub use policy::CapacityPolicy;
pub use pressure::{MemoryPressureSource, PressureHandler, PressureNotifier, Subscription};
pub use recency::RecencyIndex;
pub use stats::CacheStats;
