//! 2Q eviction (spec.md §4.2.5): a small recency-only queue (`a1_in`) backed
//! by a ghost queue of evicted keys (`a1_out`), and a full LRU queue for
//! entries that have proven themselves by being re-referenced (`am`).
//! Ported from the teacher's byte-weighted `two_q_stack.rs` to an
//! item-count model: `a1_in` and `a1_out` are each sized as a fixed ratio
//! of total capacity.

use std::hash::Hash;

use crate::collections::HashList;
use crate::error::PolicyError;
use crate::policy::{require_capacity, EvictionPolicy};

/// Fraction of capacity reserved for the `a1_in` recency queue.
const KIN_RATIO: f64 = 0.25;
/// Fraction of capacity reserved for the `a1_out` ghost queue.
const KOUT_RATIO: f64 = 0.5;

pub struct TwoQ<K, V> {
    a1_in: HashList<K, V>,
    a1_out: HashList<K, ()>,
    am: HashList<K, V>,
    capacity: usize,
    kin: usize,
    kout: usize,
}

impl<K, V> TwoQ<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Result<Self, PolicyError> {
        require_capacity(capacity)?;

        let kin = ((capacity as f64) * KIN_RATIO).max(1.0) as usize;
        let kout = ((capacity as f64) * KOUT_RATIO).max(1.0) as usize;

        Ok(TwoQ {
            a1_in: HashList::new(),
            a1_out: HashList::new(),
            am: HashList::new(),
            capacity,
            kin,
            kout,
        })
    }

    fn total_len(&self) -> usize {
        self.a1_in.len() + self.am.len()
    }

    /// Evicts from `a1_in` (to the ghost queue) or `am`, whichever is due,
    /// until the combined hot set fits capacity.
    ///
    /// `recent_evict` is set when the key being inserted is itself a ghost
    /// hit (already in `a1_out`) and about to be promoted into `am`. That
    /// promotion removes its own entry from `a1_out` right after this call
    /// returns, so the generic `kout` overflow trim below must not run —
    /// otherwise it could pop a different, still-live ghost entry instead.
    fn ensure_space(&mut self, recent_evict: bool) -> Option<(K, V)> {
        if self.total_len() < self.capacity {
            return None;
        }

        if self.a1_in.len() > self.kin {
            if let Some((key, value)) = self.a1_in.pop_back() {
                self.a1_out.push_front(key.clone(), ());

                if !recent_evict && self.a1_out.len() > self.kout {
                    self.a1_out.pop_back();
                }

                return Some((key, value));
            }
        }

        self.am.pop_back()
    }
}

impl<K, V> EvictionPolicy<K, V> for TwoQ<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.am.contains(&key) {
            self.am.update(&key, |v| *v = value);
            self.am.move_front(&key);
            return None;
        }

        if self.a1_in.contains(&key) {
            self.a1_in.update(&key, |v| *v = value);
            return None;
        }

        let ghost_hit = self.a1_out.contains(&key);
        let evicted = self.ensure_space(ghost_hit);

        if ghost_hit {
            // Key was recently evicted from a1_in: it's proven itself,
            // promote straight into the full LRU queue.
            self.a1_out.remove(&key);
            self.am.push_front(key, value);
        } else {
            self.a1_in.push_front(key, value);
        }

        evicted
    }

    fn get(&mut self, key: &K) -> Option<V> {
        if let Some(value) = self.am.get(key) {
            self.am.move_front(key);
            return Some(value);
        }

        if let Some(value) = self.a1_in.get(key).cloned() {
            // A hit while still in a1_in promotes to the full queue.
            self.a1_in.remove(key);
            self.am.push_front(key.clone(), value.clone());

            if self.total_len() > self.capacity {
                self.am.pop_back();
            }

            return Some(value);
        }

        None
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.am.get(key).or_else(|| self.a1_in.get(key)).cloned()
    }

    fn delete(&mut self, key: &K) -> bool {
        let removed_am = self.am.remove(key).is_some();
        let removed_in = self.a1_in.remove(key).is_some();
        self.a1_out.remove(key);

        removed_am || removed_in
    }

    fn purge(&mut self) {
        self.a1_in.clear();
        self.a1_out.clear();
        self.am.clear();
    }

    fn keys(&self) -> Vec<K> {
        self.am.keys().chain(self.a1_in.keys()).cloned().collect()
    }

    fn values(&self) -> Vec<V> {
        self.am
            .iter()
            .chain(self.a1_in.iter())
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn all(&self) -> Vec<(K, V)> {
        self.am
            .iter()
            .chain(self.a1_in.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn range(&self, f: &mut dyn FnMut(&K, &V) -> bool) {
        for (k, v) in self.am.iter().chain(self.a1_in.iter()) {
            if !f(k, v) {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.total_len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn algorithm(&self) -> &'static str {
        "2q"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(TwoQ::<u32, u32>::new(0), Err(crate::error::PolicyError::ZeroCapacity));
    }

    #[test]
    fn one_time_scan_does_not_evict_hot_entries() {
        let mut two_q = TwoQ::new(4).unwrap();

        two_q.set("hot1", 1);
        two_q.set("hot2", 2);

        // promote both into the full queue by re-referencing them
        two_q.get(&"hot1");
        two_q.get(&"hot2");

        // a one-time scan through a1_in only
        for k in 0..10 {
            two_q.set(k, k);
        }

        assert!(two_q.has(&"hot1"));
        assert!(two_q.has(&"hot2"));
    }

    #[test]
    fn ghost_hit_promotes_to_am_instead_of_reentering_a1_in() {
        // capacity 2 => kin = kout = 1.
        let mut two_q = TwoQ::new(2).unwrap();

        two_q.set("a", 1);
        two_q.set("b", 2);
        two_q.set("c", 3); // evicts "a" from a1_in into the a1_out ghost queue
        two_q.set("a", 10); // "a" is a ghost hit: must be promoted into am

        assert!(two_q.am.contains(&"a"));
        assert!(!two_q.a1_in.contains(&"a"));
    }

    #[test]
    fn capacity_bound_holds() {
        let mut two_q = TwoQ::new(4).unwrap();

        for k in 0..50 {
            two_q.set(k, k);
        }

        assert!(two_q.len() <= two_q.capacity());
    }
}
