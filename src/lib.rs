//! An embeddable, in-process key/value cache with pluggable eviction
//! policies (LRU, LFU, FIFO, SIEVE, 2Q, ARC, TinyLFU, W-TinyLFU), TTL and
//! stale-while-revalidate expiry, negative (missing-key) caching, loader
//! chaining with request deduplication, background revalidation, a
//! background janitor, and optional Prometheus metrics.
//!
//! Everything is assembled through [`CacheBuilder`]:
//!
//! ```
//! use stratum_cache::{CacheBuilder, Algorithm};
//!
//! let cache: stratum_cache::HighLevelCache<String, Vec<u8>, String> =
//!     CacheBuilder::new(Algorithm::Lru, 1024).build().unwrap();
//!
//! cache.set("key".to_string(), b"value".to_vec()).unwrap();
//! assert_eq!(cache.get(&"key".to_string()).unwrap(), Some(b"value".to_vec()));
//! ```
//!
//! Lower-level building blocks — a bare [`EvictionPolicy`] engine, the
//! [`Locked`] thread-safety wrapper, or [`Sharded`] fan-out — are exported
//! for embedders who want the policy mechanics without the rest of the
//! high-level cache's machinery (loaders, TTL, missing-key caching).

mod builder;
mod clock;
mod collections;
mod error;
mod highlevel;
mod item;
mod janitor;
mod loader;
mod locked;
mod metrics;
mod policy;
mod sharded;
mod singleflight;
mod sketch;
mod stats;
mod store;

pub use builder::CacheBuilder;
pub use clock::{Clock, ClockHandle};
pub use error::{CacheError, PolicyError};
pub use highlevel::{HighLevelCache, RevalidationErrorPolicy};
pub use item::{Item, Jitter};
pub use janitor::{ExpiryIndex, Janitor};
pub use loader::{Loader, LoaderChain};
pub use locked::{EvictionReason, Locked};
pub use metrics::{Collector, NoopCollector};
pub use policy::{Algorithm, Arc as ArcPolicy, EvictionPolicy, Fifo, Lfu, Lru, Sieve, TinyLfu, TwoQ, WTinyLfu};
pub use sharded::Sharded;
pub use singleflight::Group as SingleFlightGroup;
pub use stats::{AtomicStats, CacheStats};

#[cfg(feature = "prometheus")]
pub use metrics::PrometheusCollector;
