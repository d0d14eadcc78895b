//! Sharded fan-out (spec.md §4.4): `n` independent [`Locked`] caches, keys
//! routed by `hasher(key) mod n`. Batch operations are dispatched per-shard
//! in parallel via `rayon`, the way the teacher parallelizes independent
//! per-connection work across its worker threads.
//!
//! spec.md §9 notes that a prior implementation's `Len()` returned a single
//! shard's count instead of the sum across all shards; this crate's `len`
//! sums every shard, which is the documented fix rather than the bug.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::PolicyError;
use crate::locked::{EvictionReason, Locked};
use crate::policy::EvictionPolicy;

fn default_hasher<K: Hash>(key: &K) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

pub struct Sharded<P, K, V> {
    shards: Vec<Locked<P, K, V>>,
    hasher: Arc<dyn Fn(&K) -> u64 + Send + Sync>,
}

impl<P, K, V> Sharded<P, K, V>
where
    P: EvictionPolicy<K, V>,
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Builds one shard per entry in `shards`, preserving their order for
    /// routing purposes. `shard_count` must be greater than 1 — a single
    /// shard is just [`Locked`] and should be used directly.
    pub fn new(shards: Vec<P>) -> Result<Self, PolicyError> {
        Self::with_hasher(shards, Arc::new(default_hasher))
    }

    /// As [`Sharded::new`], but routes keys through a caller-supplied
    /// hasher (spec.md §6.1 `sharding(n, hasher)`) instead of the default.
    pub fn with_hasher(shards: Vec<P>, hasher: Arc<dyn Fn(&K) -> u64 + Send + Sync>) -> Result<Self, PolicyError> {
        if shards.len() <= 1 {
            return Err(PolicyError::InvalidShardCount);
        }

        Ok(Sharded {
            shards: shards.into_iter().map(Locked::new).collect(),
            hasher,
        })
    }

    pub fn with_eviction_callback<F>(shards: Vec<P>, callback: F) -> Result<Self, PolicyError>
    where
        F: Fn(&K, &V, EvictionReason) + Send + Sync + Clone + 'static,
    {
        if shards.len() <= 1 {
            return Err(PolicyError::InvalidShardCount);
        }

        Ok(Sharded {
            shards: shards
                .into_iter()
                .map(|p| Locked::with_eviction_callback(p, callback.clone()))
                .collect(),
            hasher: Arc::new(default_hasher),
        })
    }

    fn shard_index(&self, key: &K) -> usize {
        ((self.hasher)(key) as usize) % self.shards.len()
    }

    fn shard_for(&self, key: &K) -> &Locked<P, K, V> {
        &self.shards[self.shard_index(key)]
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn set(&self, key: K, value: V) -> Option<(K, V)> {
        self.shard_for(&key).set(key, value)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.shard_for(key).get(key)
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        self.shard_for(key).peek(key)
    }

    pub fn has(&self, key: &K) -> bool {
        self.shard_for(key).has(key)
    }

    pub fn delete(&self, key: &K) -> bool {
        self.shard_for(key).delete(key)
    }

    pub fn delete_many(&self, keys: &[K]) -> Vec<(K, bool)> {
        keys.iter().map(|k| (k.clone(), self.delete(k))).collect()
    }

    /// As [`Locked::delete_and_take`], routed to the owning shard.
    pub fn delete_and_take(&self, key: &K) -> Option<V> {
        self.shard_for(key).delete_and_take(key)
    }

    /// Raises the eviction callback on whichever shard owns `key`. Used by
    /// callers (e.g. TTL discovery) that evict a key outside of a shard's
    /// own `set`/`set_many` and still need the callback to fire.
    pub(crate) fn notify_evicted(&self, key: &K, value: &V, reason: EvictionReason) {
        self.shard_for(key).notify_evicted(key, value, reason);
    }

    pub fn purge(&self) {
        self.shards.iter().for_each(Locked::purge);
    }

    /// Total length across all shards. spec.md §9 documents this as the
    /// fix to a prior bug where only one shard's length was reported.
    pub fn len(&self) -> usize {
        self.shards.iter().map(Locked::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shards.iter().map(Locked::capacity).sum()
    }

    /// Every shard runs the same algorithm; this is that algorithm's name.
    pub fn algorithm(&self) -> &'static str {
        self.shards[0].algorithm()
    }

    pub fn keys(&self) -> Vec<K> {
        self.shards.iter().flat_map(Locked::keys).collect()
    }

    pub fn values(&self) -> Vec<V> {
        self.shards.iter().flat_map(Locked::values).collect()
    }

    pub fn all(&self) -> Vec<(K, V)> {
        self.shards.iter().flat_map(Locked::all).collect()
    }

    pub fn range(&self, mut f: impl FnMut(&K, &V) -> bool) {
        for shard in &self.shards {
            let mut keep_going = true;

            shard.range(|k, v| {
                keep_going = f(k, v);
                keep_going
            });

            if !keep_going {
                break;
            }
        }
    }
}

impl<P, K, V> Sharded<P, K, V>
where
    P: EvictionPolicy<K, V> + Send,
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Groups `items` by shard and dispatches each shard's batch in
    /// parallel, preserving per-shard evicted pairs in the returned vec
    /// (order across shards is not meaningful).
    pub fn set_many(&self, items: Vec<(K, V)>) -> Vec<(K, V)> {
        let mut buckets: Vec<Vec<(K, V)>> = (0..self.shards.len()).map(|_| Vec::new()).collect();

        for (k, v) in items {
            let idx = self.shard_index(&k);
            buckets[idx].push((k, v));
        }

        self.shards
            .par_iter()
            .zip(buckets.into_par_iter())
            .filter(|(_, bucket)| !bucket.is_empty())
            .flat_map(|(shard, bucket)| shard.set_many(bucket))
            .collect()
    }

    pub fn get_many(&self, keys: &[K]) -> Vec<(K, Option<V>)> {
        let mut buckets: Vec<Vec<K>> = (0..self.shards.len()).map(|_| Vec::new()).collect();

        for key in keys {
            let idx = self.shard_index(key);
            buckets[idx].push(key.clone());
        }

        self.shards
            .par_iter()
            .zip(buckets.into_par_iter())
            .filter(|(_, bucket)| !bucket.is_empty())
            .flat_map(|(shard, bucket)| shard.get_many(&bucket))
            .collect()
    }

    fn bucket_by_shard(&self, keys: &[K]) -> Vec<Vec<K>> {
        let mut buckets: Vec<Vec<K>> = (0..self.shards.len()).map(|_| Vec::new()).collect();

        for key in keys {
            let idx = self.shard_index(key);
            buckets[idx].push(key.clone());
        }

        buckets
    }

    pub fn peek_many(&self, keys: &[K]) -> Vec<(K, Option<V>)> {
        let buckets = self.bucket_by_shard(keys);

        self.shards
            .par_iter()
            .zip(buckets.into_par_iter())
            .filter(|(_, bucket)| !bucket.is_empty())
            .flat_map(|(shard, bucket)| shard.peek_many(&bucket))
            .collect()
    }

    pub fn has_many(&self, keys: &[K]) -> Vec<(K, bool)> {
        let buckets = self.bucket_by_shard(keys);

        self.shards
            .par_iter()
            .zip(buckets.into_par_iter())
            .filter(|(_, bucket)| !bucket.is_empty())
            .flat_map(|(shard, bucket)| shard.has_many(&bucket))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Lru;

    fn make_sharded(shard_count: usize, capacity_per_shard: usize) -> Sharded<Lru<u32, u32>, u32, u32> {
        let shards = (0..shard_count).map(|_| Lru::new(capacity_per_shard).unwrap()).collect();
        Sharded::new(shards).unwrap()
    }

    #[test]
    fn rejects_a_single_shard() {
        let shards = vec![Lru::<u32, u32>::new(4).unwrap()];
        assert_eq!(Sharded::new(shards).err(), Some(PolicyError::InvalidShardCount));
    }

    #[test]
    fn len_sums_across_shards_not_just_one() {
        let sharded = make_sharded(4, 10);

        for k in 0..40 {
            sharded.set(k, k);
        }

        assert_eq!(sharded.len(), 40);
        assert_eq!(sharded.keys().len(), 40);
    }

    #[test]
    fn routes_same_key_to_same_shard_consistently() {
        let sharded = make_sharded(4, 10);

        sharded.set(7_u32, 1);
        assert_eq!(sharded.get(&7), Some(1));
        assert!(sharded.has(&7));
        sharded.delete(&7);
        assert!(!sharded.has(&7));
    }

    #[test]
    fn batch_set_and_get_round_trip() {
        let sharded = make_sharded(4, 10);

        let items: Vec<_> = (0..20).map(|k| (k, k * 10)).collect();
        sharded.set_many(items);

        let keys: Vec<u32> = (0..20).collect();
        let results = sharded.get_many(&keys);

        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|(_, v)| v.is_some()));
    }
}
