//! Adaptive Replacement Cache eviction (spec.md §4.2.6): two LRU queues for
//! entries seen once (`t1`) and at least twice (`t2`), each backed by a
//! ghost queue (`b1`, `b2`) of evicted keys, with a target size `p` for `t1`
//! that adapts on every ghost hit. Ported from the teacher's byte-weighted
//! `arc_stack.rs` to an item-count model: `p` and the queue lengths are
//! measured in entries rather than bytes.

use std::hash::Hash;

use crate::collections::HashList;
use crate::error::PolicyError;
use crate::policy::{require_capacity, EvictionPolicy};

pub struct Arc<K, V> {
    t1: HashList<K, V>,
    t2: HashList<K, V>,
    b1: HashList<K, ()>,
    b2: HashList<K, ()>,
    capacity: usize,
    p: f64,
}

impl<K, V> Arc<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Result<Self, PolicyError> {
        require_capacity(capacity)?;

        Ok(Arc {
            t1: HashList::new(),
            t2: HashList::new(),
            b1: HashList::new(),
            b2: HashList::new(),
            capacity,
            p: 0.0,
        })
    }

    fn target_t1(&self) -> usize {
        self.p.round() as usize
    }

    /// Evicts from `t1` or `t2` into the matching ghost list, following the
    /// target split `p`. The evicted pair is returned for the caller's
    /// eviction callback. Ghost-list bounds are not enforced here: Case IV
    /// (see `set`'s new-key branch) trims `b1`/`b2` explicitly, the way the
    /// ARC paper keeps `|T1|+|T2|+|B1|+|B2| <= 2*capacity`.
    fn replace(&mut self, favor_t2: bool) -> Option<(K, V)> {
        let t1_over_target = !self.t1.is_empty() && (self.t1.len() > self.target_t1() || (self.t1.len() == self.target_t1() && favor_t2));

        if t1_over_target {
            let (key, value) = self.t1.pop_back()?;
            self.b1.push_front(key.clone(), ());
            Some((key, value))
        } else {
            let (key, value) = self.t2.pop_back()?;
            self.b2.push_front(key.clone(), ());
            Some((key, value))
        }
    }
}

impl<K, V> EvictionPolicy<K, V> for Arc<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(()) = self.t2.get(&key).map(|_| ()) {
            self.t2.update(&key, |v| *v = value);
            self.t2.move_front(&key);
            return None;
        }

        if self.t1.contains(&key) {
            // a re-reference while still in t1 promotes to t2
            self.t1.remove(&key);
            self.t2.push_front(key, value);
            return None;
        }

        let in_b1 = self.b1.contains(&key);
        let in_b2 = self.b2.contains(&key);

        let mut evicted = None;

        if in_b1 {
            let delta = if self.b1.len() >= self.b2.len() { 1.0 } else { self.b2.len() as f64 / self.b1.len() as f64 };
            self.p = (self.p + delta).min(self.capacity as f64);
            evicted = self.replace(false);
            self.b1.remove(&key);
            self.t2.push_front(key, value);
        } else if in_b2 {
            let delta = if self.b2.len() >= self.b1.len() { 1.0 } else { self.b1.len() as f64 / self.b2.len() as f64 };
            self.p = (self.p - delta).max(0.0);
            evicted = self.replace(true);
            self.b2.remove(&key);
            self.t2.push_front(key, value);
        } else {
            // Case IV: `key` is in neither t1, t2, b1 nor b2.
            let t1_plus_b1 = self.t1.len() + self.b1.len();
            let total = t1_plus_b1 + self.t2.len() + self.b2.len();

            if t1_plus_b1 == self.capacity {
                if self.t1.len() < self.capacity {
                    self.b1.pop_back();
                    evicted = self.replace(false);
                } else {
                    // b1 is empty and t1 alone fills the cache: evict t1's
                    // LRU entry directly, no ghost entry is created for it.
                    evicted = self.t1.pop_back();
                }
            } else if total >= self.capacity {
                if total == 2 * self.capacity {
                    self.b2.pop_back();
                }

                evicted = self.replace(false);
            }

            self.t1.push_front(key, value);
        }

        evicted
    }

    fn get(&mut self, key: &K) -> Option<V> {
        if let Some(value) = self.t2.get(key).cloned() {
            self.t2.move_front(key);
            return Some(value);
        }

        if let Some(value) = self.t1.get(key).cloned() {
            self.t1.remove(key);
            self.t2.push_front(key.clone(), value.clone());
            return Some(value);
        }

        None
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.t1.get(key).or_else(|| self.t2.get(key)).cloned()
    }

    fn delete(&mut self, key: &K) -> bool {
        let removed = self.t1.remove(key).is_some() || self.t2.remove(key).is_some();
        self.b1.remove(key);
        self.b2.remove(key);

        removed
    }

    fn purge(&mut self) {
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.p = 0.0;
    }

    fn keys(&self) -> Vec<K> {
        self.t1.keys().chain(self.t2.keys()).cloned().collect()
    }

    fn values(&self) -> Vec<V> {
        self.t1.iter().chain(self.t2.iter()).map(|(_, v)| v.clone()).collect()
    }

    fn all(&self) -> Vec<(K, V)> {
        self.t1
            .iter()
            .chain(self.t2.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn range(&self, f: &mut dyn FnMut(&K, &V) -> bool) {
        for (k, v) in self.t1.iter().chain(self.t2.iter()) {
            if !f(k, v) {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn algorithm(&self) -> &'static str {
        "arc"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(Arc::<u32, u32>::new(0), Err(crate::error::PolicyError::ZeroCapacity));
    }

    #[test]
    fn reaccessed_entry_is_promoted_to_t2() {
        let mut arc = Arc::new(4).unwrap();

        arc.set(1, "a");
        arc.get(&1);

        assert!(arc.t2.contains(&1));
        assert!(!arc.t1.contains(&1));
    }

    #[test]
    fn ghost_hit_on_b1_grows_t1_target() {
        let mut arc = Arc::new(2).unwrap();

        arc.set(1, "a");
        arc.set(2, "b");
        // evicts 1 from t1 into b1
        arc.set(3, "c");

        assert!(arc.b1.contains(&1));

        let p_before = arc.p;
        arc.set(1, "a-again");
        assert!(arc.p >= p_before);
    }

    #[test]
    fn case_iv_evicts_t1_directly_once_b1_is_exhausted() {
        // capacity 2, t1 fills to capacity with no ghost entries yet.
        let mut arc = Arc::new(2).unwrap();

        arc.set(1, "a");
        arc.set(2, "b");
        // |t1|+|b1| == capacity and |t1| == capacity: evicts t1's LRU directly.
        arc.set(3, "c");

        assert!(!arc.t1.contains(&1));
        assert!(arc.b1.is_empty());
        assert!(arc.t1.contains(&3));
    }

    #[test]
    fn capacity_bound_holds() {
        let mut arc = Arc::new(3).unwrap();

        for k in 0..30 {
            arc.set(k, k);
            if k % 2 == 0 {
                arc.get(&k);
            }
        }

        assert!(arc.len() <= arc.capacity());
    }
}
