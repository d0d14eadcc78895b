//! TinyLFU and Windowed TinyLFU eviction (spec.md §4.2.7). Unlike the other
//! policies, admission is itself a decision: a candidate competing for the
//! last slot is only let in if a count-min sketch estimates it as more
//! popular than the current victim, with a doorkeeper bloom filter gating
//! one-off keys out of the sketch entirely. Not grounded on the teacher
//! (PaperCache has no sketch-based policy); the admission/window split is
//! the standard Caffeine design, built on this crate's own
//! [`crate::sketch::CountMinSketch`] and [`crate::policy::Lru`].

use std::hash::Hash;

use crate::collections::HashList;
use crate::error::PolicyError;
use crate::policy::{require_capacity, EvictionPolicy, Lru};
use crate::sketch::{CountMinSketch, Doorkeeper};

fn sketch_width(capacity: usize) -> usize {
    (capacity * 4).max(64)
}

fn reset_interval(capacity: usize) -> usize {
    (capacity * 10).max(256)
}

/// Plain TinyLFU: a single LRU-ordered main segment with sketch-gated
/// admission at the point of eviction.
pub struct TinyLfu<K, V> {
    list: HashList<K, V>,
    capacity: usize,
    sketch: CountMinSketch,
    doorkeeper: Doorkeeper,
}

impl<K, V> TinyLfu<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Result<Self, PolicyError> {
        require_capacity(capacity)?;

        Ok(TinyLfu {
            list: HashList::new(),
            capacity,
            sketch: CountMinSketch::new(sketch_width(capacity), reset_interval(capacity)),
            doorkeeper: Doorkeeper::new(sketch_width(capacity)),
        })
    }

    fn record_access(&mut self, key: &K) {
        if self.doorkeeper.mark_and_check(key) {
            self.sketch.inc(key);
        }
    }

    fn frequency(&self, key: &K) -> u8 {
        self.sketch.estimate(key)
    }
}

impl<K, V> EvictionPolicy<K, V> for TinyLfu<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.record_access(&key);

        if self.list.contains(&key) {
            self.list.update(&key, |v| *v = value);
            self.list.move_front(&key);
            return None;
        }

        if self.list.len() < self.capacity {
            self.list.push_front(key, value);
            return None;
        }

        let (victim_key, _) = self.list.back()?;
        let victim_key = victim_key.clone();

        if self.frequency(&key) <= self.frequency(&victim_key) {
            // Candidate loses the admission contest: the incumbent stays
            // and the new key is simply not stored.
            return None;
        }

        let evicted = self.list.pop_back();
        self.list.push_front(key, value);
        evicted
    }

    fn get(&mut self, key: &K) -> Option<V> {
        self.record_access(key);
        let value = self.list.get(key).cloned()?;
        self.list.move_front(key);
        Some(value)
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.list.get(key).cloned()
    }

    fn delete(&mut self, key: &K) -> bool {
        self.list.remove(key).is_some()
    }

    fn purge(&mut self) {
        self.list.clear();
    }

    fn keys(&self) -> Vec<K> {
        self.list.keys().cloned().collect()
    }

    fn values(&self) -> Vec<V> {
        self.list.iter().map(|(_, v)| v.clone()).collect()
    }

    fn all(&self) -> Vec<(K, V)> {
        self.list.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    fn range(&self, f: &mut dyn FnMut(&K, &V) -> bool) {
        for (k, v) in self.list.iter() {
            if !f(k, v) {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.list.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn algorithm(&self) -> &'static str {
        "tinylfu"
    }
}

/// Windowed TinyLFU: a small LRU admission window absorbs bursty new keys
/// unconditionally; a key evicted from the window only enters the (larger)
/// main segment if the sketch says it beats the main segment's victim.
pub struct WTinyLfu<K, V> {
    window: Lru<K, V>,
    main: HashList<K, V>,
    main_capacity: usize,
    sketch: CountMinSketch,
    doorkeeper: Doorkeeper,
}

const WINDOW_RATIO: f64 = 0.01;

impl<K, V> WTinyLfu<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Result<Self, PolicyError> {
        require_capacity(capacity)?;

        let window_capacity = ((capacity as f64) * WINDOW_RATIO).max(1.0) as usize;
        let main_capacity = capacity.saturating_sub(window_capacity).max(1);

        Ok(WTinyLfu {
            window: Lru::new(window_capacity)?,
            main: HashList::new(),
            main_capacity,
            sketch: CountMinSketch::new(sketch_width(capacity), reset_interval(capacity)),
            doorkeeper: Doorkeeper::new(sketch_width(capacity)),
        })
    }

    fn record_access(&mut self, key: &K) {
        if self.doorkeeper.mark_and_check(key) {
            self.sketch.inc(key);
        }
    }

    fn frequency(&self, key: &K) -> u8 {
        self.sketch.estimate(key)
    }

    /// Admits `key`/`value`, evicted from the window, into the main
    /// segment if it wins the admission contest against the main
    /// segment's current victim.
    fn admit_to_main(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.main.len() < self.main_capacity {
            self.main.push_front(key, value);
            return None;
        }

        let (victim_key, _) = self.main.back()?;
        let victim_key = victim_key.clone();

        if self.frequency(&key) <= self.frequency(&victim_key) {
            return Some((key, value));
        }

        let evicted = self.main.pop_back();
        self.main.push_front(key, value);
        evicted
    }
}

impl<K, V> EvictionPolicy<K, V> for WTinyLfu<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.record_access(&key);

        if self.main.contains(&key) {
            self.main.update(&key, |v| *v = value);
            self.main.move_front(&key);
            return None;
        }

        if self.window.has(&key) {
            self.window.set(key, value);
            return None;
        }

        match self.window.set(key, value) {
            Some((evicted_key, evicted_value)) => self.admit_to_main(evicted_key, evicted_value),
            None => None,
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        self.record_access(key);

        if let Some(value) = self.main.get(key).cloned() {
            self.main.move_front(key);
            return Some(value);
        }

        self.window.get(key)
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.main.get(key).cloned().or_else(|| self.window.peek(key))
    }

    fn delete(&mut self, key: &K) -> bool {
        let removed_main = self.main.remove(key).is_some();
        let removed_window = self.window.delete(key);

        removed_main || removed_window
    }

    fn purge(&mut self) {
        self.main.clear();
        self.window.purge();
    }

    fn keys(&self) -> Vec<K> {
        self.main.keys().cloned().chain(self.window.keys()).collect()
    }

    fn values(&self) -> Vec<V> {
        self.main
            .iter()
            .map(|(_, v)| v.clone())
            .chain(self.window.values())
            .collect()
    }

    fn all(&self) -> Vec<(K, V)> {
        self.main
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(self.window.all())
            .collect()
    }

    fn range(&self, f: &mut dyn FnMut(&K, &V) -> bool) {
        for (k, v) in self.main.iter() {
            if !f(k, v) {
                return;
            }
        }

        self.window.range(f);
    }

    fn len(&self) -> usize {
        self.main.len() + self.window.len()
    }

    fn capacity(&self) -> usize {
        self.main_capacity + self.window.capacity()
    }

    fn algorithm(&self) -> &'static str {
        "wtinylfu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(TinyLfu::<u32, u32>::new(0), Err(crate::error::PolicyError::ZeroCapacity));
        assert_eq!(WTinyLfu::<u32, u32>::new(0), Err(crate::error::PolicyError::ZeroCapacity));
    }

    #[test]
    fn popular_key_wins_admission_over_cold_scan() {
        let mut lfu = TinyLfu::new(2).unwrap();

        lfu.set("hot", 1);
        lfu.set("warm", 2);

        // make "hot" clearly more popular than anything that follows
        for _ in 0..20 {
            lfu.get(&"hot");
        }

        // a long scan of one-off keys should not be able to evict "hot"
        for k in 0..50 {
            lfu.set(k, k);
        }

        assert!(lfu.has(&"hot"));
        assert!(lfu.len() <= lfu.capacity());
    }

    #[test]
    fn w_tinylfu_capacity_bound_holds() {
        let mut w = WTinyLfu::new(10).unwrap();

        for k in 0..200 {
            w.set(k, k);
        }

        assert!(w.len() <= w.capacity());
    }
}
