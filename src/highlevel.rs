//! The high-level cache (spec.md §4.6): composes a policy engine (via
//! [`crate::locked::Locked`]) with TTL/stale/jitter, missing-key (negative)
//! caching, loader chaining, singleflight deduplication, background
//! revalidation, and the background janitor. Constructed exclusively
//! through [`crate::builder::CacheBuilder`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rand::thread_rng;

use crate::clock::Clock;
use crate::error::CacheError;
use crate::item::{Item, Jitter};
use crate::janitor::Janitor;
use crate::loader::LoaderChain;
use crate::locked::EvictionReason;
use crate::metrics::Collector;
use crate::singleflight;
use crate::stats::{AtomicStats, CacheStats};
use crate::store::Store;

/// How a revalidation loader's error is handled (spec.md §6.1, §9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevalidationErrorPolicy {
    DropOnError,
    KeepOnError,
}

type MainCache<K, V> = Store<K, Item<V>>;

pub(crate) enum MissingCache<K, V> {
    Disabled,
    Shared,
    Dedicated(MainCache<K, V>),
}

pub(crate) struct Inner<K, V, E> {
    pub(crate) main: MainCache<K, V>,
    missing: MissingCache<K, V>,
    ttl_ns: i64,
    stale_ns: i64,
    jitter: Jitter,
    loaders: LoaderChain<K, V, E>,
    revalidation_loaders: Option<LoaderChain<K, V, E>>,
    revalidation_error_policy: RevalidationErrorPolicy,
    clock: Clock,
    copy_on_read: Option<Arc<dyn Fn(&V) -> V + Send + Sync>>,
    copy_on_write: Option<Arc<dyn Fn(&V) -> V + Send + Sync>>,
    collector: Arc<dyn Collector>,
    stats: AtomicStats,
    in_flight: singleflight::Group<K, (HashMap<K, V>, Vec<K>), CacheError<E>>,
    janitor: Mutex<Option<Janitor>>,
}

/// A composed, ready-to-use cache. Cheap to clone: clones share the same
/// underlying state (it's an `Arc` handle), the way the teacher's
/// `AtomicStatus`/`AtomicStats` are shared across worker threads.
pub struct HighLevelCache<K, V, E> {
    pub(crate) inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for HighLevelCache<K, V, E> {
    fn clone(&self) -> Self {
        HighLevelCache { inner: self.inner.clone() }
    }
}

impl<K, V, E> HighLevelCache<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_parts(
        main: MainCache<K, V>,
        missing: MissingCache<K, V>,
        ttl_ns: i64,
        stale_ns: i64,
        jitter: Jitter,
        loaders: LoaderChain<K, V, E>,
        revalidation_loaders: Option<LoaderChain<K, V, E>>,
        revalidation_error_policy: RevalidationErrorPolicy,
        clock: Clock,
        copy_on_read: Option<Arc<dyn Fn(&V) -> V + Send + Sync>>,
        copy_on_write: Option<Arc<dyn Fn(&V) -> V + Send + Sync>>,
        collector: Arc<dyn Collector>,
    ) -> Self {
        let inner = Inner {
            main,
            missing,
            ttl_ns,
            stale_ns,
            jitter,
            loaders,
            revalidation_loaders,
            revalidation_error_policy,
            clock,
            copy_on_read,
            copy_on_write,
            collector,
            stats: AtomicStats::new(),
            in_flight: singleflight::Group::new(),
            janitor: Mutex::new(None),
        };

        HighLevelCache { inner: Arc::new(inner) }
    }

    fn copy_out(&self, value: &V) -> V {
        match &self.inner.copy_on_read {
            Some(copy) => copy(value),
            None => value.clone(),
        }
    }

    fn copy_in(&self, value: V) -> V {
        match &self.inner.copy_on_write {
            Some(copy) => copy(&value),
            None => value,
        }
    }

    // -- reading -----------------------------------------------------

    pub fn get(&self, key: &K) -> Result<Option<V>, CacheError<E>> {
        self.get_with_loaders(key, &self.inner.loaders)
    }

    pub fn get_with_loaders(&self, key: &K, loaders: &LoaderChain<K, V, E>) -> Result<Option<V>, CacheError<E>> {
        let now = self.inner.clock.now_ns();

        if let Some(item) = self.lookup_get(key, now) {
            self.inner.collector.hit();
            self.inner.stats.record_hit();
            debug!("cache hit");

            if item.should_revalidate(now) {
                self.spawn_revalidation(vec![key.clone()]);
            }

            return Ok(item.into_value().map(|v| self.copy_out(&v)));
        }

        self.inner.collector.miss();
        self.inner.stats.record_miss();
        debug!("cache miss, loading");

        let key_for_load = key.clone();

        let result = self.inner.in_flight.run(key_for_load.clone(), || {
            loaders.run(std::slice::from_ref(&key_for_load)).map_err(CacheError::LoaderError)
        });

        let (found, _missing) = result?;
        self.store_loaded(vec![key.clone()], found, now);

        Ok(self.lookup_peek(key, now).and_then(Item::into_value).map(|v| self.copy_out(&v)))
    }

    pub fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>, CacheError<E>> {
        self.get_many_with_loaders(keys, &self.inner.loaders)
    }

    /// Acquires each backing store's lock once for the whole key set — via
    /// [`HighLevelCache::lookup_get_many`] and, for keys a loader fills in,
    /// [`HighLevelCache::lookup_peek_many`] — rather than once per key
    /// (spec.md §4.3/§5/§9's batch single-lock-acquisition contract).
    pub fn get_many_with_loaders(&self, keys: &[K], loaders: &LoaderChain<K, V, E>) -> Result<HashMap<K, V>, CacheError<E>> {
        let now = self.inner.clock.now_ns();

        let found_items = self.lookup_get_many(keys, now);

        let mut results = HashMap::new();
        let mut missing = Vec::new();
        let mut stale_keys = Vec::new();

        for key in keys {
            match found_items.get(key) {
                Some(item) => {
                    self.inner.collector.hit();
                    self.inner.stats.record_hit();
                    debug!("cache hit");

                    if item.should_revalidate(now) {
                        stale_keys.push(key.clone());
                    }

                    if let Some(value) = item.value() {
                        results.insert(key.clone(), self.copy_out(value));
                    }
                }
                None => {
                    self.inner.collector.miss();
                    self.inner.stats.record_miss();
                    debug!("cache miss, loading");
                    missing.push(key.clone());
                }
            }
        }

        if !stale_keys.is_empty() {
            self.spawn_revalidation(stale_keys);
        }

        if missing.is_empty() {
            return Ok(results);
        }

        let found = loaders.run(&missing).map_err(CacheError::LoaderError)?;
        self.store_loaded(missing.clone(), found.0, now);

        for (key, item) in self.lookup_peek_many(&missing, now) {
            if let Some(value) = item.value() {
                results.insert(key, self.copy_out(value));
            }
        }

        Ok(results)
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        let now = self.inner.clock.now_ns();
        self.lookup_peek(key, now).and_then(Item::into_value).map(|v| self.copy_out(&v))
    }

    pub fn peek_many(&self, keys: &[K]) -> HashMap<K, V> {
        keys.iter().filter_map(|k| self.peek(k).map(|v| (k.clone(), v))).collect()
    }

    /// `true` if the cache holds a decision for `key` at all — a positive
    /// value or a remembered negative (missing) entry — not just whether
    /// `peek` would return a value.
    pub fn has(&self, key: &K) -> bool {
        let now = self.inner.clock.now_ns();
        self.lookup_peek(key, now).is_some()
    }

    pub fn has_many(&self, keys: &[K]) -> Vec<(K, bool)> {
        keys.iter().map(|k| (k.clone(), self.has(k))).collect()
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner
            .main
            .all()
            .into_iter()
            .filter(|(_, item)| item.has_value())
            .map(|(k, _)| k)
            .collect()
    }

    pub fn len(&self) -> usize {
        let main_len = self.inner.main.all().iter().filter(|(_, item)| item.has_value()).count();

        match &self.inner.missing {
            MissingCache::Dedicated(missing) => main_len + missing.len(),
            _ => main_len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops as soon as `f` returns `false`; expired entries are skipped.
    pub fn range(&self, mut f: impl FnMut(&K, &V) -> bool) {
        let now = self.inner.clock.now_ns();

        self.inner.main.range(|k, item| {
            if item.is_expired(now) || !item.has_value() {
                return true;
            }

            match item.value() {
                Some(v) => f(k, v),
                None => true,
            }
        });
    }

    // -- writing -------------------------------------------------------

    pub fn set(&self, key: K, value: V) -> Result<(), CacheError<E>> {
        let now = self.inner.clock.now_ns();
        let value = self.copy_in(value);
        self.set_unsafe(key, true, Some(value), now)
    }

    /// Builds every item and writes them to the main store in a single
    /// `Store::set_many` call, so the backing lock is acquired once for the
    /// whole batch rather than once per key (spec.md §4.3/§5/§9).
    pub fn set_many(&self, items: Vec<(K, V)>) -> Result<(), CacheError<E>> {
        let now = self.inner.clock.now_ns();

        if items.is_empty() {
            return Ok(());
        }

        let mut rng = thread_rng();
        let mut keys = Vec::with_capacity(items.len());
        let mut built = Vec::with_capacity(items.len());

        for (key, value) in items {
            let value = self.copy_in(value);
            let item = Item::with_value(value, now, self.inner.ttl_ns, self.inner.stale_ns, &self.inner.jitter, &mut rng);
            keys.push(key.clone());
            built.push((key, item));
        }

        if let MissingCache::Dedicated(missing) = &self.inner.missing {
            missing.delete_many(&keys);
        }

        let evicted = self.inner.main.set_many(built);

        for _ in &evicted {
            self.inner.collector.eviction(EvictionReason::Capacity);
            self.inner.stats.record_eviction(EvictionReason::Capacity);
        }

        for _ in &keys {
            self.inner.collector.insertion();
            self.inner.stats.record_insertion();
        }

        debug!("cache set_many: {} item(s)", keys.len());

        Ok(())
    }

    pub fn set_missing(&self, key: K) -> Result<(), CacheError<E>> {
        let now = self.inner.clock.now_ns();
        self.set_unsafe(key, false, None, now)
    }

    pub fn set_missing_many(&self, keys: Vec<K>) -> Result<(), CacheError<E>> {
        let now = self.inner.clock.now_ns();

        for k in keys {
            self.set_unsafe(k, false, None, now)?;
        }

        Ok(())
    }

    pub fn delete(&self, key: &K) {
        debug!("cache delete");
        self.inner.main.delete(key);

        if let MissingCache::Dedicated(missing) = &self.inner.missing {
            missing.delete(key);
        }
    }

    pub fn delete_many(&self, keys: &[K]) {
        for key in keys {
            self.delete(key);
        }
    }

    pub fn purge(&self) {
        self.inner.main.purge();

        if let MissingCache::Dedicated(missing) = &self.inner.missing {
            missing.purge();
        }
    }

    // -- introspection ---------------------------------------------------

    pub fn capacity(&self) -> (usize, usize) {
        match &self.inner.missing {
            MissingCache::Dedicated(missing) => (self.inner.main.capacity(), missing.capacity()),
            _ => (self.inner.main.capacity(), 0),
        }
    }

    pub fn algorithm(&self) -> (&'static str, &'static str) {
        match &self.inner.missing {
            MissingCache::Dedicated(missing) => (self.inner.main.algorithm(), missing.algorithm()),
            _ => (self.inner.main.algorithm(), ""),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.len(), self.inner.main.capacity(), self.inner.main.algorithm())
    }

    // -- warm-up -----------------------------------------------------

    /// Calls `loader` once; applies the returned map via the batch set
    /// path. Fails with `MissingCacheDisabled` if `missing_keys` is
    /// non-empty but no negative cache is configured.
    pub fn warm_up(&self, loader: impl FnOnce() -> Result<(HashMap<K, V>, Vec<K>), E>) -> Result<(), CacheError<E>> {
        let (found, missing_keys) = loader().map_err(CacheError::LoaderError)?;

        if !missing_keys.is_empty() && matches!(self.inner.missing, MissingCache::Disabled) {
            return Err(CacheError::MissingCacheDisabled);
        }

        let found_count = found.len();
        let missing_count = missing_keys.len();

        self.set_many(found.into_iter().collect())?;
        self.set_missing_many(missing_keys)?;

        info!("warm-up complete: {found_count} object(s) loaded, {missing_count} known-missing");

        Ok(())
    }

    pub fn warm_up_with_timeout(
        &self,
        timeout: Duration,
        loader: impl FnOnce() -> Result<(HashMap<K, V>, Vec<K>), E> + Send + 'static,
    ) -> Result<(), CacheError<E>> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        std::thread::spawn(move || {
            let _ = tx.send(loader());
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                let (found, missing_keys) = result.map_err(CacheError::LoaderError)?;

                if !missing_keys.is_empty() && matches!(self.inner.missing, MissingCache::Disabled) {
                    return Err(CacheError::MissingCacheDisabled);
                }

                let found_count = found.len();
                let missing_count = missing_keys.len();

                self.set_many(found.into_iter().collect())?;
                self.set_missing_many(missing_keys)?;

                info!("warm-up complete: {found_count} object(s) loaded, {missing_count} known-missing");

                Ok(())
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                warn!("warm-up timed out after {timeout:?}");
                Err(CacheError::WarmUpTimeout)
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                error!("warm-up loader thread exited without sending a result");
                Err(CacheError::Internal("warm-up loader thread panicked".to_string()))
            }
        }
    }

    // -- janitor -----------------------------------------------------

    /// Starts the background TTL sweep if it isn't already running.
    pub fn janitor(&self) {
        let mut slot = self.inner.janitor.lock();

        if slot.is_some() || self.inner.ttl_ns <= 0 {
            return;
        }

        let inner = self.inner.clone();
        let interval = Duration::from_nanos(self.inner.ttl_ns.max(1) as u64);

        let janitor = Janitor::spawn(self.inner.clock.clone(), interval, Duration::from_millis(1), move |now_ns| {
            sweep_expired(&inner, now_ns);
            None
        });

        info!("janitor started, sweeping every {interval:?}");

        *slot = Some(janitor);
    }

    /// Stops the background sweep, joining the thread. Safe to call
    /// multiple times, and safe to call when no janitor is running.
    pub fn stop_janitor(&self) {
        let mut slot = self.inner.janitor.lock();

        if slot.take().is_some() {
            info!("janitor stopped");
        }
    }

    // -- internals -----------------------------------------------------

    fn lookup_get(&self, key: &K, now: i64) -> Option<Item<V>> {
        if let Some(item) = self.inner.main.get(key) {
            if !item.is_expired(now) {
                return Some(item);
            }

            if let Some(value) = self.inner.main.delete_and_take(key) {
                self.inner.main.notify_evicted(key, &value, EvictionReason::Ttl);
                self.inner.collector.eviction(EvictionReason::Ttl);
                self.inner.stats.record_eviction(EvictionReason::Ttl);
            }
        }

        if let MissingCache::Dedicated(missing) = &self.inner.missing {
            if let Some(item) = missing.get(key) {
                if !item.is_expired(now) {
                    return Some(item);
                }

                if let Some(value) = missing.delete_and_take(key) {
                    missing.notify_evicted(key, &value, EvictionReason::Ttl);
                    self.inner.collector.eviction(EvictionReason::Ttl);
                    self.inner.stats.record_eviction(EvictionReason::Ttl);
                }
            }
        }

        None
    }

    fn lookup_peek(&self, key: &K, now: i64) -> Option<Item<V>> {
        if let Some(item) = self.inner.main.peek(key) {
            if !item.is_expired(now) {
                return Some(item);
            }
        }

        if let MissingCache::Dedicated(missing) = &self.inner.missing {
            if let Some(item) = missing.peek(key) {
                if !item.is_expired(now) {
                    return Some(item);
                }
            }
        }

        None
    }

    /// As [`HighLevelCache::lookup_get`], but for a whole key batch: each
    /// backing store's lock is acquired once via `Store::get_many`/
    /// `delete_many`, not once per key.
    fn lookup_get_many(&self, keys: &[K], now: i64) -> HashMap<K, Item<V>> {
        let mut found: HashMap<K, Item<V>> = HashMap::new();
        let mut expired: Vec<(K, Item<V>)> = Vec::new();

        for (key, item) in self.inner.main.get_many(keys) {
            match item {
                Some(item) if !item.is_expired(now) => {
                    found.insert(key, item);
                }
                Some(item) => expired.push((key, item)),
                None => {}
            }
        }

        if !expired.is_empty() {
            let expired_keys: Vec<K> = expired.iter().map(|(k, _)| k.clone()).collect();
            self.inner.main.delete_many(&expired_keys);

            for (key, item) in &expired {
                if let Some(value) = item.value() {
                    self.inner.main.notify_evicted(key, value, EvictionReason::Ttl);
                    self.inner.collector.eviction(EvictionReason::Ttl);
                    self.inner.stats.record_eviction(EvictionReason::Ttl);
                }
            }
        }

        if let MissingCache::Dedicated(missing) = &self.inner.missing {
            let still_missing: Vec<K> = keys.iter().filter(|k| !found.contains_key(k)).cloned().collect();

            if !still_missing.is_empty() {
                let mut expired_missing: Vec<(K, Item<V>)> = Vec::new();

                for (key, item) in missing.get_many(&still_missing) {
                    match item {
                        Some(item) if !item.is_expired(now) => {
                            found.insert(key, item);
                        }
                        Some(item) => expired_missing.push((key, item)),
                        None => {}
                    }
                }

                if !expired_missing.is_empty() {
                    let expired_keys: Vec<K> = expired_missing.iter().map(|(k, _)| k.clone()).collect();
                    missing.delete_many(&expired_keys);

                    for _ in &expired_missing {
                        self.inner.collector.eviction(EvictionReason::Ttl);
                        self.inner.stats.record_eviction(EvictionReason::Ttl);
                    }
                }
            }
        }

        found
    }

    /// As [`HighLevelCache::lookup_peek`], batched the same way as
    /// [`HighLevelCache::lookup_get_many`] (read-only, so no eviction
    /// bookkeeping is needed here).
    fn lookup_peek_many(&self, keys: &[K], now: i64) -> HashMap<K, Item<V>> {
        let mut found: HashMap<K, Item<V>> = HashMap::new();

        for (key, item) in self.inner.main.peek_many(keys) {
            if let Some(item) = item {
                if !item.is_expired(now) {
                    found.insert(key, item);
                }
            }
        }

        if let MissingCache::Dedicated(missing) = &self.inner.missing {
            let still_missing: Vec<K> = keys.iter().filter(|k| !found.contains_key(k)).cloned().collect();

            if !still_missing.is_empty() {
                for (key, item) in missing.peek_many(&still_missing) {
                    if let Some(item) = item {
                        if !item.is_expired(now) {
                            found.insert(key, item);
                        }
                    }
                }
            }
        }

        found
    }

    /// §4.6.3: the internal single-key writer every public write path
    /// funnels through.
    fn set_unsafe(&self, key: K, has_value: bool, value: Option<V>, now: i64) -> Result<(), CacheError<E>> {
        if !has_value && matches!(self.inner.missing, MissingCache::Disabled) {
            return Ok(());
        }

        let shared_missing = matches!(self.inner.missing, MissingCache::Shared);
        let mut rng = thread_rng();

        let item = match &value {
            Some(v) => Item::with_value(v.clone(), now, self.inner.ttl_ns, self.inner.stale_ns, &self.inner.jitter, &mut rng),
            None => Item::no_value(now, self.inner.ttl_ns, self.inner.stale_ns, &self.inner.jitter, &mut rng),
        };

        // Avoid ghosts: a positive set removes any negative entry for the
        // same key in the dedicated missing cache, and vice versa.
        if let MissingCache::Dedicated(missing) = &self.inner.missing {
            if has_value {
                missing.delete(&key);
            } else {
                self.inner.main.delete(&key);
            }
        }

        let evicted = if has_value || shared_missing {
            self.inner.main.set(key, item)
        } else if let MissingCache::Dedicated(missing) = &self.inner.missing {
            missing.set(key, item)
        } else {
            None
        };

        if evicted.is_some() {
            self.inner.collector.eviction(EvictionReason::Capacity);
            self.inner.stats.record_eviction(EvictionReason::Capacity);
            debug!("cache set evicted an entry for capacity");
        }

        self.inner.collector.insertion();
        self.inner.stats.record_insertion();
        debug!("cache set: has_value={has_value}");

        Ok(())
    }

    /// As [`HighLevelCache::set_unsafe`] applied to a whole loader result,
    /// but batched: every item destined for `main` is written with a single
    /// `Store::set_many` call, and likewise for the dedicated missing store,
    /// rather than one `Store::set`/`delete` round trip per key.
    fn store_loaded(&self, requested: Vec<K>, found: HashMap<K, V>, now: i64) {
        if requested.is_empty() {
            return;
        }

        let shared_missing = matches!(self.inner.missing, MissingCache::Shared);
        let disabled_missing = matches!(self.inner.missing, MissingCache::Disabled);
        let mut rng = thread_rng();

        let mut to_main = Vec::new();
        let mut to_missing = Vec::new();
        let mut delete_from_main = Vec::new();
        let mut delete_from_missing = Vec::new();

        for key in requested {
            match found.get(&key) {
                Some(value) => {
                    let item = Item::with_value(value.clone(), now, self.inner.ttl_ns, self.inner.stale_ns, &self.inner.jitter, &mut rng);
                    delete_from_missing.push(key.clone());
                    to_main.push((key, item));
                }
                None => {
                    if disabled_missing {
                        continue;
                    }

                    let item = Item::no_value(now, self.inner.ttl_ns, self.inner.stale_ns, &self.inner.jitter, &mut rng);

                    if shared_missing {
                        to_main.push((key, item));
                    } else {
                        delete_from_main.push(key.clone());
                        to_missing.push((key, item));
                    }
                }
            }
        }

        if let MissingCache::Dedicated(missing) = &self.inner.missing {
            if !delete_from_missing.is_empty() {
                missing.delete_many(&delete_from_missing);
            }
        }

        if !delete_from_main.is_empty() {
            self.inner.main.delete_many(&delete_from_main);
        }

        if !to_main.is_empty() {
            let count = to_main.len();
            let evicted = self.inner.main.set_many(to_main);

            for _ in &evicted {
                self.inner.collector.eviction(EvictionReason::Capacity);
                self.inner.stats.record_eviction(EvictionReason::Capacity);
            }

            for _ in 0..count {
                self.inner.collector.insertion();
                self.inner.stats.record_insertion();
            }
        }

        if !to_missing.is_empty() {
            if let MissingCache::Dedicated(missing) = &self.inner.missing {
                let count = to_missing.len();
                let evicted = missing.set_many(to_missing);

                for _ in &evicted {
                    self.inner.collector.eviction(EvictionReason::Capacity);
                    self.inner.stats.record_eviction(EvictionReason::Capacity);
                }

                for _ in 0..count {
                    self.inner.collector.insertion();
                    self.inner.stats.record_insertion();
                }
            }
        }

        debug!("cache store_loaded batch complete");
    }

    fn spawn_revalidation(&self, keys: Vec<K>) {
        let inner = self.inner.clone();

        std::thread::spawn(move || {
            let loaders = inner.revalidation_loaders.as_ref().unwrap_or(&inner.loaders);
            let now = inner.clock.now_ns();

            match loaders.run(&keys) {
                Ok((found, _missing)) => {
                    for key in &keys {
                        if let Some(value) = found.get(key) {
                            let mut rng = thread_rng();
                            let item = Item::with_value(value.clone(), now, inner.ttl_ns, inner.stale_ns, &inner.jitter, &mut rng);
                            inner.main.set(key.clone(), item);
                        }
                    }
                }
                Err(_) if inner.revalidation_error_policy == RevalidationErrorPolicy::DropOnError => {
                    warn!("background revalidation failed for {} key(s); letting the stale window expire", keys.len());
                }
                Err(_) => {
                    // KeepOnError: existing items are left untouched, which
                    // re-inserting here would only race with; no-op is the
                    // correct "keep" behavior since the item is still there.
                    warn!("background revalidation failed for {} key(s); keeping the stale value", keys.len());
                }
            }
        });
    }
}

fn sweep_expired<K, V, E>(inner: &Arc<Inner<K, V, E>>, now_ns: i64)
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let expired_main: Vec<(K, Item<V>)> = inner.main.all().into_iter().filter(|(_, item)| item.is_expired(now_ns)).collect();

    if !expired_main.is_empty() {
        let keys: Vec<K> = expired_main.iter().map(|(k, _)| k.clone()).collect();
        inner.main.delete_many(&keys);

        for (k, item) in &expired_main {
            if let Some(value) = item.value() {
                inner.main.notify_evicted(k, value, EvictionReason::Ttl);
                inner.collector.eviction(EvictionReason::Ttl);
                inner.stats.record_eviction(EvictionReason::Ttl);
            }
        }
    }

    if let MissingCache::Dedicated(missing) = &inner.missing {
        let expired_missing: Vec<(K, Item<V>)> = missing.all().into_iter().filter(|(_, item)| item.is_expired(now_ns)).collect();

        if !expired_missing.is_empty() {
            let keys: Vec<K> = expired_missing.iter().map(|(k, _)| k.clone()).collect();
            missing.delete_many(&keys);

            for _ in &expired_missing {
                inner.collector.eviction(EvictionReason::Ttl);
                inner.stats.record_eviction(EvictionReason::Ttl);
            }
        }
    }
}
