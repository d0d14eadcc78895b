//! SIEVE eviction (spec.md §4.2.4). New entries are pushed to the front;
//! a "hand" pointer sweeps from the back towards the front looking for an
//! unvisited entry to evict, clearing visited bits as it passes over them
//! (the second-chance mechanism). Grounded on the teacher's
//! `worker/policy/policy_stack/sieve_stack.rs`, which walks the hand via
//! `HashList::before`.

use std::hash::Hash;

use crate::collections::HashList;
use crate::error::PolicyError;
use crate::policy::{require_capacity, EvictionPolicy};

pub struct Sieve<K, V> {
    list: HashList<K, V>,
    visited: std::collections::HashMap<K, bool>,
    hand: Option<K>,
    capacity: usize,
}

impl<K, V> Sieve<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Result<Self, PolicyError> {
        require_capacity(capacity)?;

        Ok(Sieve {
            list: HashList::new(),
            visited: std::collections::HashMap::new(),
            hand: None,
            capacity,
        })
    }

    /// Sweeps the hand from its current position (or the back, if unset)
    /// towards the front, evicting the first unvisited entry it finds.
    fn evict_one(&mut self) -> Option<(K, V)> {
        let mut cursor = self
            .hand
            .clone()
            .or_else(|| self.list.back().map(|(k, _)| k.clone()));

        loop {
            let key = cursor?;

            let visited = self.visited.get(&key).copied().unwrap_or(false);

            if !visited {
                let prev = self.list.before(&key).cloned();
                self.hand = prev;
                self.visited.remove(&key);
                let value = self.list.remove(&key)?;
                return Some((key, value));
            }

            self.visited.insert(key.clone(), false);
            cursor = self.list.before(&key).cloned();

            if cursor.is_none() {
                cursor = self.list.back().map(|(k, _)| k.clone());
            }
        }
    }
}

impl<K, V> EvictionPolicy<K, V> for Sieve<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.list.contains(&key) {
            self.list.update(&key, |v| *v = value);
            self.visited.insert(key, true);
            return None;
        }

        let evicted = if self.list.len() >= self.capacity {
            self.evict_one()
        } else {
            None
        };

        self.list.push_front(key.clone(), value);
        self.visited.insert(key, false);
        evicted
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let value = self.list.get(key).cloned()?;
        self.visited.insert(key.clone(), true);
        Some(value)
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.list.get(key).cloned()
    }

    fn delete(&mut self, key: &K) -> bool {
        if self.hand.as_ref() == Some(key) {
            self.hand = self.list.before(key).cloned();
        }

        self.visited.remove(key);
        self.list.remove(key).is_some()
    }

    fn purge(&mut self) {
        self.list.clear();
        self.visited.clear();
        self.hand = None;
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
        "sieve"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(Sieve::<u32, u32>::new(0), Err(crate::error::PolicyError::ZeroCapacity));
    }

    #[test]
    fn s2_visited_entries_get_a_second_chance() {
        let mut sieve = Sieve::new(3).unwrap();

        sieve.set("a", 1);
        sieve.set("b", 2);
        sieve.set("c", 3);

        // mark "a" visited so the hand passes over it on the first sweep
        sieve.get(&"a");

        let evicted = sieve.set("d", 4);

        // "b" is the oldest unvisited entry and should be evicted first
        assert_eq!(evicted, Some(("b", 2)));
        assert!(sieve.has(&"a"));
    }

    #[test]
    fn capacity_bound_holds_under_churn() {
        let mut sieve = Sieve::new(2).unwrap();

        for k in 0..20 {
            sieve.set(k, k);
            sieve.get(&k);
        }

        assert!(sieve.len() <= sieve.capacity());
    }
}
