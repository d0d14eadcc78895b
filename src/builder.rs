//! The cache's entry point (spec.md §6.1): a fluent builder that collects
//! every configuration option, validates them all up front, and only then
//! assembles the policy engines and the running [`HighLevelCache`]. No
//! teacher precedent: the teacher constructs a cache directly via
//! `PaperCache::new(max_size, policies) -> Result<Self, CacheError>`
//! (`paper_cache.rs`), with no builder at all. This type's shape — one
//! `with_*`-style method per knob, a single fallible `build` — follows the
//! builder convention common across the rest of the pack instead.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::clock::Clock;
use crate::error::CacheError;
use crate::highlevel::{HighLevelCache, MissingCache, RevalidationErrorPolicy};
use crate::item::Jitter;
use crate::loader::{Loader, LoaderChain};
use crate::locked::EvictionReason;
use crate::metrics::{Collector, NoopCollector};
use crate::policy::Algorithm;
use crate::store::Store;

type WarmUpLoader<K, V, E> = Box<dyn FnOnce() -> Result<(HashMap<K, V>, Vec<K>), E> + Send>;

enum WarmUpSpec<K, V, E> {
    Immediate(WarmUpLoader<K, V, E>),
    WithTimeout(Duration, WarmUpLoader<K, V, E>),
}

/// Collects configuration for a [`HighLevelCache`] and validates it at
/// [`CacheBuilder::build`] time. `K`/`V` are the key/value types the cache
/// will hold; `E` is the error type loaders may fail with.
pub struct CacheBuilder<K, V, E> {
    algorithm: Algorithm,
    capacity: usize,
    missing_shared: bool,
    missing_dedicated: Option<(Algorithm, usize)>,
    ttl_ns: i64,
    stale_ns: i64,
    revalidation_loaders: Option<LoaderChain<K, V, E>>,
    revalidation_error_policy: RevalidationErrorPolicy,
    jitter: Jitter,
    shard_count: Option<usize>,
    shard_hasher: Option<Arc<dyn Fn(&K) -> u64 + Send + Sync>>,
    without_locking: bool,
    janitor: bool,
    loaders: LoaderChain<K, V, E>,
    eviction_callback: Option<Arc<dyn Fn(&K, &V, EvictionReason) + Send + Sync>>,
    copy_on_read: Option<Arc<dyn Fn(&V) -> V + Send + Sync>>,
    copy_on_write: Option<Arc<dyn Fn(&V) -> V + Send + Sync>>,
    prometheus_prefix: Option<&'static str>,
    clock: Clock,
    warm_up: Option<WarmUpSpec<K, V, E>>,
}

impl<K, V, E> CacheBuilder<K, V, E>
where
    K: Eq + Hash + Clone,
{
    /// Starts a builder for `algorithm` with the given main-cache capacity.
    /// `capacity` must be greater than zero for every algorithm except
    /// [`Algorithm::Lru`], which treats `0` as unbounded (spec.md §3).
    pub fn new(algorithm: Algorithm, capacity: usize) -> Self {
        CacheBuilder {
            algorithm,
            capacity,
            missing_shared: false,
            missing_dedicated: None,
            ttl_ns: 0,
            stale_ns: 0,
            revalidation_loaders: None,
            revalidation_error_policy: RevalidationErrorPolicy::DropOnError,
            jitter: Jitter::NONE,
            shard_count: None,
            shard_hasher: None,
            without_locking: false,
            janitor: false,
            loaders: LoaderChain::new(),
            eviction_callback: None,
            copy_on_read: None,
            copy_on_write: None,
            prometheus_prefix: None,
            clock: Clock::monotonic(),
            warm_up: None,
        }
    }

    /// Missing keys are negatively cached in the same main cache (spec.md
    /// §4.6.2), competing with positive entries for the same capacity.
    pub fn missing_shared(mut self) -> Self {
        self.missing_shared = true;
        self
    }

    /// Missing keys get their own policy engine, isolated from the main
    /// cache's capacity (spec.md §4.6.2).
    pub fn missing_dedicated(mut self, algorithm: Algorithm, capacity: usize) -> Self {
        self.missing_dedicated = Some((algorithm, capacity));
        self
    }

    /// Time-to-live after which an entry becomes eligible for eviction.
    /// `Duration::ZERO` (the default) means entries never expire.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ns = ttl.as_nanos() as i64;
        self
    }

    /// Extends an expired entry's lifetime by `stale` during which it is
    /// still served (marked for background revalidation) rather than
    /// treated as gone. `loaders`, if given, replaces the main loader chain
    /// for revalidation only; otherwise revalidation reuses it.
    pub fn stale(mut self, stale: Duration, loaders: Option<Vec<Loader<K, V, E>>>) -> Self {
        self.stale_ns = stale.as_nanos() as i64;

        if let Some(loaders) = loaders {
            let mut chain = LoaderChain::new();

            for loader in loaders {
                chain.push(loader);
            }

            self.revalidation_loaders = Some(chain);
        }

        self
    }

    pub fn revalidation_error_policy(mut self, policy: RevalidationErrorPolicy) -> Self {
        self.revalidation_error_policy = policy;
        self
    }

    /// Randomizes each entry's TTL by up to `upper_bound`, scaled by
    /// `lambda` (spec.md §4.5), to avoid synchronized mass expiry.
    pub fn jitter(mut self, lambda: f64, upper_bound: Duration) -> Self {
        self.jitter = Jitter {
            lambda,
            upper_ns: upper_bound.as_nanos() as i64,
        };
        self
    }

    /// Splits the main cache into `shards` independently-locked instances,
    /// routed by `hasher` (spec.md §4.4, §6.1).
    pub fn sharding(mut self, shards: usize, hasher: Arc<dyn Fn(&K) -> u64 + Send + Sync>) -> Self {
        self.shard_count = Some(shards);
        self.shard_hasher = Some(hasher);
        self
    }

    /// Declares the embedder's intent to skip internal locking. Currently
    /// enforced only as a build-time constraint (it cannot be combined with
    /// [`CacheBuilder::janitor`], which needs to mutate the cache
    /// concurrently with callers); every cache is still backed by
    /// [`crate::locked::Locked`] internally.
    pub fn without_locking(mut self) -> Self {
        self.without_locking = true;
        self
    }

    /// Starts a background thread that periodically sweeps out expired
    /// entries (spec.md §4.6.5), so expiry isn't only discovered on read.
    pub fn janitor(mut self) -> Self {
        self.janitor = true;
        self
    }

    pub fn loaders(mut self, loaders: Vec<Loader<K, V, E>>) -> Self {
        for loader in loaders {
            self.loaders.push(loader);
        }

        self
    }

    /// Called, with no lock held, whenever an entry leaves the cache via
    /// capacity or TTL eviction (never an explicit `delete`).
    pub fn eviction_callback(mut self, callback: impl Fn(&K, &V, EvictionReason) + Send + Sync + 'static) -> Self {
        self.eviction_callback = Some(Arc::new(callback));
        self
    }

    /// Applied to every value returned by a read, instead of `V::clone`.
    pub fn copy_on_read(mut self, f: impl Fn(&V) -> V + Send + Sync + 'static) -> Self {
        self.copy_on_read = Some(Arc::new(f));
        self
    }

    /// Applied to every value before it is stored, instead of passing it
    /// through unchanged.
    pub fn copy_on_write(mut self, f: impl Fn(&V) -> V + Send + Sync + 'static) -> Self {
        self.copy_on_write = Some(Arc::new(f));
        self
    }

    /// Forwards counters and gauges to the `metrics` facade under `name`
    /// (spec.md §6.3). Requires the `prometheus` feature; `name` must not
    /// be empty. Without the feature, this is accepted but has no effect —
    /// the cache falls back to [`NoopCollector`].
    pub fn prometheus_metrics(mut self, name: &'static str) -> Self {
        self.prometheus_prefix = Some(name);
        self
    }

    /// Overrides the time source. Primarily useful in tests, via
    /// [`Clock::offset`], to control TTL/stale expiry deterministically.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Calls `loader` once, synchronously, as the last step of `build`.
    pub fn warm_up(mut self, loader: impl FnOnce() -> Result<(HashMap<K, V>, Vec<K>), E> + Send + 'static) -> Self {
        self.warm_up = Some(WarmUpSpec::Immediate(Box::new(loader)));
        self
    }

    /// As [`CacheBuilder::warm_up`], but `loader` runs on its own thread and
    /// `build` fails with [`CacheError::WarmUpTimeout`] if it hasn't
    /// finished within `timeout` (spec.md §5). The loader may still be
    /// running in the background when that happens.
    pub fn warm_up_with_timeout(mut self, timeout: Duration, loader: impl FnOnce() -> Result<(HashMap<K, V>, Vec<K>), E> + Send + 'static) -> Self {
        self.warm_up = Some(WarmUpSpec::WithTimeout(timeout, Box::new(loader)));
        self
    }
}

impl<K, V, E> CacheBuilder<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn build(self) -> Result<HighLevelCache<K, V, E>, CacheError<E>> {
        if self.jitter.lambda < 0.0 {
            return Err(CacheError::InvalidConfiguration("jitter lambda must be >= 0".into()));
        }

        if self.jitter.upper_ns < 0 {
            return Err(CacheError::InvalidConfiguration("jitter upper bound must be >= 0".into()));
        }

        if let Some(name) = self.prometheus_prefix {
            if name.is_empty() {
                return Err(CacheError::InvalidConfiguration("prometheus metrics name must not be empty".into()));
            }
        }

        if self.janitor && self.without_locking {
            return Err(CacheError::InvalidConfiguration("janitor cannot be combined with without_locking".into()));
        }

        if let Some(count) = self.shard_count {
            if count <= 1 {
                return Err(CacheError::InvalidConfiguration("sharding requires more than one shard".into()));
            }
        }

        let main = self.build_store(self.algorithm, self.capacity)?;

        let missing = if let Some((algorithm, capacity)) = self.missing_dedicated {
            MissingCache::Dedicated(self.build_store(algorithm, capacity)?)
        } else if self.missing_shared {
            MissingCache::Shared
        } else {
            MissingCache::Disabled
        };

        let collector: Arc<dyn Collector> = self.collector();

        let cache = HighLevelCache::from_parts(
            main,
            missing,
            self.ttl_ns,
            self.stale_ns,
            self.jitter,
            self.loaders,
            self.revalidation_loaders,
            self.revalidation_error_policy,
            self.clock,
            self.copy_on_read,
            self.copy_on_write,
            collector,
        );

        info!(
            "cache constructed: algorithm={:?} capacity={} shards={}",
            self.algorithm,
            self.capacity,
            self.shard_count.unwrap_or(1)
        );

        if self.janitor {
            cache.janitor();
        }

        match self.warm_up {
            Some(WarmUpSpec::Immediate(loader)) => cache.warm_up(loader)?,
            Some(WarmUpSpec::WithTimeout(timeout, loader)) => cache.warm_up_with_timeout(timeout, loader)?,
            None => {}
        }

        Ok(cache)
    }

    fn build_store(&self, algorithm: Algorithm, capacity: usize) -> Result<Store<K, crate::item::Item<V>>, CacheError<E>> {
        match (self.shard_count, &self.shard_hasher) {
            (Some(count), Some(hasher)) => {
                let shards = (0..count)
                    .map(|_| algorithm.build::<K, crate::item::Item<V>>(capacity))
                    .collect::<Result<Vec<_>, _>>()?;

                match &self.eviction_callback {
                    Some(callback) => {
                        let callback = callback.clone();

                        Ok(Store::sharded_with_callback(shards, move |k, item: &crate::item::Item<V>, r| {
                            if let Some(v) = item.value() {
                                callback(k, v, r);
                            }
                        })?)
                    }
                    None => Ok(Store::sharded(shards, hasher.clone())?),
                }
            }
            _ => {
                let policy = algorithm.build::<K, crate::item::Item<V>>(capacity)?;

                match &self.eviction_callback {
                    Some(callback) => {
                        let callback = callback.clone();

                        Ok(Store::single_with_callback(policy, move |k, item: &crate::item::Item<V>, r| {
                            if let Some(v) = item.value() {
                                callback(k, v, r);
                            }
                        }))
                    }
                    None => Ok(Store::single(policy)),
                }
            }
        }
    }

    fn collector(&self) -> Arc<dyn Collector> {
        #[cfg(feature = "prometheus")]
        if let Some(prefix) = self.prometheus_prefix {
            return Arc::new(crate::metrics::PrometheusCollector::new(prefix));
        }

        Arc::new(NoopCollector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Algorithm;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn negative_jitter_lambda_is_rejected() {
        let result: Result<HighLevelCache<u32, u32, String>, _> = CacheBuilder::new(Algorithm::Lru, 4).jitter(-1.0, Duration::from_secs(1)).build();

        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn janitor_and_without_locking_conflict_rejected() {
        let result: Result<HighLevelCache<u32, u32, String>, _> = CacheBuilder::new(Algorithm::Lru, 4).janitor().without_locking().build();

        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn empty_prometheus_name_is_rejected() {
        let result: Result<HighLevelCache<u32, u32, String>, _> = CacheBuilder::new(Algorithm::Lru, 4).prometheus_metrics("").build();

        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn single_shard_count_is_rejected() {
        let result: Result<HighLevelCache<u32, u32, String>, _> = CacheBuilder::new(Algorithm::Lru, 4).sharding(1, Arc::new(|k: &u32| *k as u64)).build();

        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn zero_capacity_non_lru_algorithm_is_rejected() {
        let result: Result<HighLevelCache<u32, u32, String>, _> = CacheBuilder::new(Algorithm::Fifo, 0).build();

        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn basic_cache_round_trips_a_value() {
        let cache: HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 4).build().unwrap();

        cache.set(1, 100).unwrap();
        assert_eq!(cache.get(&1).unwrap(), Some(100));
    }

    #[test]
    fn sharded_cache_round_trips_across_shards() {
        let cache: HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 4).sharding(4, Arc::new(|k: &u32| *k as u64)).build().unwrap();

        for key in 0..16 {
            cache.set(key, key * 10).unwrap();
        }

        for key in 0..16 {
            assert_eq!(cache.get(&key).unwrap(), Some(key * 10));
        }
    }

    #[test]
    fn eviction_callback_is_wired_through_the_builder() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let cache: HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 1)
            .eviction_callback(move |_k, _v, _reason| {
                calls2.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        cache.set(1, 1).unwrap();
        cache.set(2, 2).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn warm_up_populates_the_cache_before_first_use() {
        let cache: HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 4)
            .warm_up(|| {
                let mut found = HashMap::new();
                found.insert(1_u32, 100_u32);
                Ok((found, vec![]))
            })
            .build()
            .unwrap();

        assert_eq!(cache.peek(&1), Some(100));
    }
}
