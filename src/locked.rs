//! Thread-safety decorator (spec.md §4.3): wraps a single, non-thread-safe
//! [`EvictionPolicy`] engine in a [`parking_lot::RwLock`] and adds the
//! eviction-callback dispatch point. `get`/`get_many` take the *write* lock,
//! not a read lock, because every policy reorders its internal structure on
//! access — this mirrors the teacher's own single-writer-thread model
//! (`worker/manager.rs` serializes all policy operations through one
//! channel) with a lock instead of a channel.

use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::policy::EvictionPolicy;

/// Why an entry left the cache without being explicitly deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionReason {
    Capacity,
    Ttl,
}

thread_local! {
    static IN_EVICTION_CALLBACK: std::cell::Cell<bool> = std::cell::Cell::new(false);
}

/// Adds synchronization and eviction-callback dispatch around a single
/// [`EvictionPolicy`] engine. Not itself sharded — see [`crate::sharded`]
/// for fan-out across multiple `Locked` instances.
pub struct Locked<P, K, V> {
    policy: RwLock<P>,
    on_evict: Option<Arc<dyn Fn(&K, &V, EvictionReason) + Send + Sync>>,
    _marker: std::marker::PhantomData<fn(K, V)>,
}

impl<P, K, V> Locked<P, K, V>
where
    P: EvictionPolicy<K, V>,
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    pub fn new(policy: P) -> Self {
        Locked {
            policy: RwLock::new(policy),
            on_evict: None,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_eviction_callback(policy: P, callback: impl Fn(&K, &V, EvictionReason) + Send + Sync + 'static) -> Self {
        Locked {
            policy: RwLock::new(policy),
            on_evict: Some(Arc::new(callback)),
            _marker: std::marker::PhantomData,
        }
    }

    /// Invokes the eviction callback, if configured, panicking instead of
    /// deadlocking if the callback re-enters this same cache. The callback
    /// runs with no lock held. `pub(crate)` so the high-level cache can
    /// raise TTL-reason evictions it discovers itself (on a `get` of an
    /// expired entry, or from the janitor sweep) through the same path.
    pub(crate) fn notify_evicted(&self, key: &K, value: &V, reason: EvictionReason) {
        let Some(callback) = &self.on_evict else {
            return;
        };

        let already_in_callback = IN_EVICTION_CALLBACK.with(|flag| flag.replace(true));

        if already_in_callback {
            IN_EVICTION_CALLBACK.with(|flag| flag.set(true));
            panic!("eviction callback attempted to reenter the cache it was evicted from");
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            callback(key, value, reason);
        }));

        IN_EVICTION_CALLBACK.with(|flag| flag.set(false));

        if let Err(payload) = result {
            std::panic::resume_unwind(payload);
        }
    }

    pub fn set(&self, key: K, value: V) -> Option<(K, V)> {
        let evicted = self.policy.write().set(key, value);

        if let Some((ref k, ref v)) = evicted {
            self.notify_evicted(k, v, EvictionReason::Capacity);
        }

        evicted
    }

    pub fn set_many(&self, items: Vec<(K, V)>) -> Vec<(K, V)> {
        let evicted = self.policy.write().set_many(items);

        for (k, v) in &evicted {
            self.notify_evicted(k, v, EvictionReason::Capacity);
        }

        evicted
    }

    /// Takes the write lock: every policy treats `get` as a mutating
    /// access (move-to-front, frequency bump, visited bit, ...).
    pub fn get(&self, key: &K) -> Option<V> {
        self.policy.write().get(key)
    }

    pub fn get_many(&self, keys: &[K]) -> Vec<(K, Option<V>)> {
        self.policy.write().get_many(keys)
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        self.policy.read().peek(key)
    }

    pub fn peek_many(&self, keys: &[K]) -> Vec<(K, Option<V>)> {
        self.policy.read().peek_many(keys)
    }

    pub fn has(&self, key: &K) -> bool {
        self.policy.read().has(key)
    }

    pub fn has_many(&self, keys: &[K]) -> Vec<(K, bool)> {
        self.policy.read().has_many(keys)
    }

    pub fn delete(&self, key: &K) -> bool {
        self.policy.write().delete(key)
    }

    /// Removes `key`, returning the value that was present, in a single
    /// write-lock acquisition. Used by TTL paths that need the outgoing
    /// value to pass to the eviction callback.
    pub fn delete_and_take(&self, key: &K) -> Option<V> {
        let mut policy = self.policy.write();
        let value = policy.peek(key);

        if value.is_some() {
            policy.delete(key);
        }

        value
    }

    pub fn delete_many(&self, keys: &[K]) -> Vec<(K, bool)> {
        self.policy.write().delete_many(keys)
    }

    pub fn purge(&self) {
        self.policy.write().purge();
    }

    pub fn keys(&self) -> Vec<K> {
        self.policy.read().keys()
    }

    pub fn values(&self) -> Vec<V> {
        self.policy.read().values()
    }

    pub fn all(&self) -> Vec<(K, V)> {
        self.policy.read().all()
    }

    /// Holds the read lock for the duration of `f`, per spec.md §9: a slow
    /// or re-entrant callback here blocks writers for as long as it runs.
    /// This is documented behavior, not a defect.
    pub fn range(&self, mut f: impl FnMut(&K, &V) -> bool) {
        self.policy.read().range(&mut f);
    }

    pub fn len(&self) -> usize {
        self.policy.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.policy.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.policy.read().capacity()
    }

    pub fn algorithm(&self) -> &'static str {
        self.policy.read().algorithm()
    }
}

impl<P, K, V> Locked<P, K, V>
where
    P: EvictionPolicy<K, V>,
    K: Eq + Hash + Clone + Send,
    V: Clone + Send + typesize::TypeSize,
{
    /// Walks every entry and sums its estimated heap footprint. Deliberately
    /// not on any hot path (spec.md §9): this is O(n) and meant for metrics
    /// gauges and diagnostics only.
    pub fn size_bytes(&self) -> u64 {
        self.policy
            .read()
            .all()
            .iter()
            .map(|(_, v)| v.get_size() as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Lru;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn get_bumps_recency_through_the_lock() {
        let locked = Locked::new(Lru::new(2).unwrap());

        locked.set("a", 1);
        locked.set("b", 2);
        locked.get(&"a");
        let evicted = locked.set("c", 3);

        assert_eq!(evicted, Some(("b", 2)));
    }

    #[test]
    fn eviction_callback_fires_with_capacity_reason() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let locked = Locked::with_eviction_callback(Lru::new(1).unwrap(), move |_k, _v, reason| {
            assert_eq!(reason, EvictionReason::Capacity);
            calls2.fetch_add(1, Ordering::SeqCst);
        });

        locked.set(1, "a");
        locked.set(2, "b");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "reenter")]
    fn reentrant_callback_panics_instead_of_deadlocking() {
        use std::sync::OnceLock;

        let cache: Arc<OnceLock<Locked<Lru<i32, &'static str>, i32, &'static str>>> = Arc::new(OnceLock::new());
        let cache2 = cache.clone();

        let locked = Locked::with_eviction_callback(Lru::new(1).unwrap(), move |_k, _v, _reason| {
            cache2.get().unwrap().set(99, "x");
        });

        cache.set(locked).ok();
        let locked = cache.get().unwrap();

        locked.set(1, "a");
        locked.set(2, "b");
    }
}
