//! Picks between a single [`Locked`] cache and an `n`-way [`Sharded`] one
//! (spec.md §6.1 `sharding(n, hasher)`) behind one type, so the high-level
//! cache doesn't need to know which it's talking to.

use std::hash::Hash;
use std::sync::Arc;

use crate::locked::{EvictionReason, Locked};
use crate::policy::EvictionPolicy;
use crate::sharded::Sharded;

/// Either a single policy engine behind one lock, or the same engine
/// replicated across `n` independently-locked shards. Every shard runs the
/// same algorithm and is given the same per-shard capacity, so the total
/// effective capacity of a sharded store is `capacity * shard_count`.
pub(crate) enum Store<K, V> {
    Single(Locked<Box<dyn EvictionPolicy<K, V>>, K, V>),
    Sharded(Sharded<Box<dyn EvictionPolicy<K, V>>, K, V>),
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn single(policy: Box<dyn EvictionPolicy<K, V>>) -> Self {
        Store::Single(Locked::new(policy))
    }

    pub fn single_with_callback(
        policy: Box<dyn EvictionPolicy<K, V>>,
        callback: impl Fn(&K, &V, EvictionReason) + Send + Sync + 'static,
    ) -> Self {
        Store::Single(Locked::with_eviction_callback(policy, callback))
    }

    pub fn sharded(
        shards: Vec<Box<dyn EvictionPolicy<K, V>>>,
        hasher: Arc<dyn Fn(&K) -> u64 + Send + Sync>,
    ) -> Result<Self, crate::error::PolicyError> {
        Ok(Store::Sharded(Sharded::with_hasher(shards, hasher)?))
    }

    pub fn sharded_with_callback(
        shards: Vec<Box<dyn EvictionPolicy<K, V>>>,
        callback: impl Fn(&K, &V, EvictionReason) + Send + Sync + Clone + 'static,
    ) -> Result<Self, crate::error::PolicyError> {
        Ok(Store::Sharded(Sharded::with_eviction_callback(shards, callback)?))
    }

    pub fn set(&self, key: K, value: V) -> Option<(K, V)> {
        match self {
            Store::Single(locked) => locked.set(key, value),
            Store::Sharded(sharded) => sharded.set(key, value),
        }
    }

    pub fn set_many(&self, items: Vec<(K, V)>) -> Vec<(K, V)> {
        match self {
            Store::Single(locked) => locked.set_many(items),
            Store::Sharded(sharded) => sharded.set_many(items),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        match self {
            Store::Single(locked) => locked.get(key),
            Store::Sharded(sharded) => sharded.get(key),
        }
    }

    pub fn get_many(&self, keys: &[K]) -> Vec<(K, Option<V>)> {
        match self {
            Store::Single(locked) => locked.get_many(keys),
            Store::Sharded(sharded) => sharded.get_many(keys),
        }
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        match self {
            Store::Single(locked) => locked.peek(key),
            Store::Sharded(sharded) => sharded.peek(key),
        }
    }

    pub fn peek_many(&self, keys: &[K]) -> Vec<(K, Option<V>)> {
        match self {
            Store::Single(locked) => locked.peek_many(keys),
            Store::Sharded(sharded) => sharded.peek_many(keys),
        }
    }

    pub fn has_many(&self, keys: &[K]) -> Vec<(K, bool)> {
        match self {
            Store::Single(locked) => locked.has_many(keys),
            Store::Sharded(sharded) => sharded.has_many(keys),
        }
    }

    pub fn delete(&self, key: &K) -> bool {
        match self {
            Store::Single(locked) => locked.delete(key),
            Store::Sharded(sharded) => sharded.delete(key),
        }
    }

    pub fn delete_many(&self, keys: &[K]) -> Vec<(K, bool)> {
        match self {
            Store::Single(locked) => locked.delete_many(keys),
            Store::Sharded(sharded) => sharded.delete_many(keys),
        }
    }

    pub fn delete_and_take(&self, key: &K) -> Option<V> {
        match self {
            Store::Single(locked) => locked.delete_and_take(key),
            Store::Sharded(sharded) => sharded.delete_and_take(key),
        }
    }

    pub(crate) fn notify_evicted(&self, key: &K, value: &V, reason: EvictionReason) {
        match self {
            Store::Single(locked) => locked.notify_evicted(key, value, reason),
            Store::Sharded(sharded) => sharded.notify_evicted(key, value, reason),
        }
    }

    pub fn purge(&self) {
        match self {
            Store::Single(locked) => locked.purge(),
            Store::Sharded(sharded) => sharded.purge(),
        }
    }

    pub fn all(&self) -> Vec<(K, V)> {
        match self {
            Store::Single(locked) => locked.all(),
            Store::Sharded(sharded) => sharded.all(),
        }
    }

    pub fn range(&self, f: impl FnMut(&K, &V) -> bool) {
        match self {
            Store::Single(locked) => locked.range(f),
            Store::Sharded(sharded) => sharded.range(f),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Store::Single(locked) => locked.len(),
            Store::Sharded(sharded) => sharded.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            Store::Single(locked) => locked.capacity(),
            Store::Sharded(sharded) => sharded.capacity(),
        }
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            Store::Single(locked) => locked.algorithm(),
            Store::Sharded(sharded) => sharded.algorithm(),
        }
    }
}
