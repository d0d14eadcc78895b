//! First-in-first-out eviction (spec.md §4.2.3). The simplest policy: a
//! single hash list, insertion order preserved, no reordering on access at
//! all — `get` and `peek` behave identically.

use std::hash::Hash;

use crate::collections::HashList;
use crate::error::PolicyError;
use crate::policy::{require_capacity, EvictionPolicy};

pub struct Fifo<K, V> {
    list: HashList<K, V>,
    capacity: usize,
}

impl<K, V> Fifo<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Result<Self, PolicyError> {
        require_capacity(capacity)?;

        Ok(Fifo {
            list: HashList::new(),
            capacity,
        })
    }
}

impl<K, V> EvictionPolicy<K, V> for Fifo<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.list.contains(&key) {
            self.list.update(&key, |v| *v = value);
            return None;
        }

        let evicted = if self.list.len() >= self.capacity {
            self.list.pop_back()
        } else {
            None
        };

        self.list.push_front(key, value);
        evicted
    }

    fn get(&mut self, key: &K) -> Option<V> {
        self.list.get(key).cloned()
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
        "fifo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(Fifo::<u32, u32>::new(0), Err(crate::error::PolicyError::ZeroCapacity));
    }

    #[test]
    fn eviction_follows_insertion_order_regardless_of_access() {
        let mut fifo = Fifo::new(2).unwrap();

        fifo.set("a", 1);
        fifo.set("b", 2);

        // repeated access does not protect "a" from eviction
        fifo.get(&"a");
        fifo.get(&"a");

        let evicted = fifo.set("c", 3);
        assert_eq!(evicted, Some(("a", 1)));

        let mut keys = fifo.keys();
        keys.sort();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn overwriting_existing_key_does_not_change_order() {
        let mut fifo = Fifo::new(2).unwrap();

        fifo.set(1, "a");
        fifo.set(2, "b");
        fifo.set(1, "a2");

        let evicted = fifo.set(3, "c");
        assert_eq!(evicted, Some((2, "b")));
    }
}
