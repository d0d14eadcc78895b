//! Least-recently-used eviction (spec.md §4.2.1). Grounded directly on the
//! teacher's `worker/policy/policy_stack/lru_stack.rs`: a single hash list,
//! most-recently-used at the front, overwritten in place on a `set` hit and
//! evicted from the back when it grows past capacity.

use std::hash::Hash;

use crate::collections::HashList;
use crate::error::PolicyError;
use crate::policy::EvictionPolicy;

pub struct Lru<K, V> {
    list: HashList<K, V>,
    capacity: usize,
}

impl<K, V> Lru<K, V>
where
    K: Eq + Hash + Clone,
{
    /// `capacity == 0` means unbounded, per spec.md §3 — the one policy
    /// that allows it.
    pub fn new(capacity: usize) -> Result<Self, PolicyError> {
        Ok(Lru {
            list: HashList::new(),
            capacity,
        })
    }
}

impl<K, V> EvictionPolicy<K, V> for Lru<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.list.contains(&key) {
            self.list.update(&key, |v| *v = value);
            self.list.move_front(&key);
            return None;
        }

        self.list.push_front(key, value);

        if self.capacity > 0 && self.list.len() > self.capacity {
            return self.list.pop_back();
        }

        None
    }

    fn get(&mut self, key: &K) -> Option<V> {
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
        "lru"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_lru_eviction_keeps_recent_keys() {
        let mut lru = Lru::new(2).unwrap();

        lru.set("a", 1);
        lru.set("b", 2);
        lru.get(&"a");
        let evicted = lru.set("c", 3);

        assert_eq!(evicted, Some(("b", 2)));

        let mut keys = lru.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn property_2_lru_recency_over_n_plus_one_inserts() {
        let mut lru = Lru::new(3).unwrap();

        for k in 1..=4 {
            lru.set(k, k);
        }

        assert!(!lru.has(&1));
        for k in 2..=4 {
            assert!(lru.has(&k));
        }
    }

    #[test]
    fn capacity_zero_is_unbounded() {
        let mut lru = Lru::new(0).unwrap();

        for k in 0..1000 {
            lru.set(k, k);
        }

        assert_eq!(lru.len(), 1000);
    }

    #[test]
    fn peek_does_not_reorder() {
        let mut lru = Lru::new(2).unwrap();

        lru.set(1, "a");
        lru.set(2, "b");
        lru.peek(&1);

        let evicted = lru.set(3, "c");
        assert_eq!(evicted, Some((1, "a")));
    }
}
