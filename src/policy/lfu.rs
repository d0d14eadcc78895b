//! Position-approximated LFU eviction (spec.md §4.2.2). A single hash list
//! ordered least-frequent (front) to most-frequent (back); there is no
//! explicit per-key counter, frequency is approximated purely by position,
//! and a hit bumps the entry one slot towards the back. Grounded on the
//! teacher's `lfu_stack.rs`, simplified from its count-bucket structure to
//! the single-list-with-position-bump scheme spec.md actually describes.

use std::hash::Hash;

use crate::collections::HashList;
use crate::error::PolicyError;
use crate::policy::{require_capacity, EvictionPolicy};

pub struct Lfu<K, V> {
    list: HashList<K, V>,
    capacity: usize,
    eviction_size: usize,
}

impl<K, V> Lfu<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Result<Self, PolicyError> {
        Self::with_eviction_size(capacity, 1)
    }

    /// `eviction_size` must be at least 1 and strictly less than capacity;
    /// spec.md leaves the reject-vs-clamp choice open (§9 Open Questions).
    /// This crate rejects at construction — see DESIGN.md.
    pub fn with_eviction_size(capacity: usize, eviction_size: usize) -> Result<Self, PolicyError> {
        require_capacity(capacity)?;

        if eviction_size < 1 || eviction_size >= capacity {
            return Err(crate::error::PolicyError::InvalidEvictionSize);
        }

        Ok(Lfu {
            list: HashList::new(),
            capacity,
            eviction_size,
        })
    }

    fn bump(&mut self, key: &K) {
        self.list.swap_towards_back(key);
    }
}

impl<K, V> EvictionPolicy<K, V> for Lfu<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.list.contains(&key) {
            self.list.update(&key, |v| *v = value);
            self.bump(&key);
            return None;
        }

        let mut evicted = None;

        if self.list.len() >= self.capacity {
            for _ in 0..self.eviction_size {
                if let Some(pair) = self.list.pop_front() {
                    evicted = Some(pair);
                } else {
                    break;
                }
            }
        }

        self.list.push_front(key, value);
        evicted
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let value = self.list.get(key).cloned()?;
        self.bump(key);
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
        "lfu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(Lfu::<u32, u32>::new(0), Err(crate::error::PolicyError::ZeroCapacity));
    }

    #[test]
    fn eviction_size_must_be_less_than_capacity() {
        assert_eq!(
            Lfu::<u32, u32>::with_eviction_size(4, 4),
            Err(crate::error::PolicyError::InvalidEvictionSize),
        );
    }

    #[test]
    fn frequent_keys_survive_eviction() {
        let mut lfu = Lfu::new(3).unwrap();

        lfu.set("a", 1);
        lfu.set("b", 2);
        lfu.set("c", 3);

        // bump `a` repeatedly so it moves towards the back (most-frequent)
        for _ in 0..3 {
            lfu.get(&"a");
        }

        let evicted = lfu.set("d", 4);

        // `a` has been bumped the furthest and should survive
        assert!(lfu.has(&"a"));
        assert_ne!(evicted.map(|(k, _)| k), Some("a"));
    }

    #[test]
    fn capacity_bound_holds() {
        let mut lfu = Lfu::new(2).unwrap();

        for k in 0..10 {
            lfu.set(k, k);
        }

        assert!(lfu.len() <= lfu.capacity());
    }
}
