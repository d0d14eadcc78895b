//! The eviction-policy engines (spec.md §4.1–§4.2): LRU, LFU, FIFO, SIEVE,
//! 2Q, ARC, and the TinyLFU family, each implementing the same
//! [`EvictionPolicy`] contract. None of these types are internally
//! synchronized — see [`crate::locked`] for the thread-safety decorator
//! that makes one usable from multiple threads.

mod arc;
mod fifo;
mod lfu;
mod lru;
mod sieve;
mod tinylfu;
mod two_q;

pub use arc::Arc;
pub use fifo::Fifo;
pub use lfu::Lfu;
pub use lru::Lru;
pub use sieve::Sieve;
pub use tinylfu::{TinyLfu, WTinyLfu};
pub use two_q::TwoQ;

use std::hash::Hash;

use crate::error::PolicyError;

/// The common contract every eviction-policy engine implements (spec.md
/// §4.1). Implementors are plain data structures with no internal locking;
/// [`crate::locked::Locked`] adds the synchronization the cache contract's
/// `get`-takes-a-write-lock rule requires.
pub trait EvictionPolicy<K, V>: Send
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Inserts or replaces `key`. Returns the evicted `(key, value)` pair,
    /// if capacity was exceeded by this insert.
    fn set(&mut self, key: K, value: V) -> Option<(K, V)>;

    /// Returns the value and applies the policy's access side effect
    /// (move-to-front, frequency bump, visited bit, ...).
    fn get(&mut self, key: &K) -> Option<V>;

    /// Returns the value without any side effect on policy order.
    fn peek(&self, key: &K) -> Option<V>;

    fn has(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    /// Removes `key`. Does not invoke the eviction callback (that's only
    /// for capacity/TTL evictions, never explicit deletes).
    fn delete(&mut self, key: &K) -> bool;

    fn purge(&mut self);

    fn keys(&self) -> Vec<K>;
    fn values(&self) -> Vec<V>;
    fn all(&self) -> Vec<(K, V)>;

    /// Iterates entries in unspecified order, stopping as soon as `f`
    /// returns `false`.
    fn range(&self, f: &mut dyn FnMut(&K, &V) -> bool);

    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `0` means unbounded (only LRU permits this; every other policy
    /// requires `capacity > 0` at construction).
    fn capacity(&self) -> usize;

    fn algorithm(&self) -> &'static str;

    // -- batch variants: default to iterating singles. Empty input must
    // not touch state, which each override below upholds by simply not
    // looping.

    fn set_many(&mut self, items: Vec<(K, V)>) -> Vec<(K, V)> {
        let mut evicted = Vec::new();

        for (k, v) in items {
            if let Some(pair) = self.set(k, v) {
                evicted.push(pair);
            }
        }

        evicted
    }

    fn get_many(&mut self, keys: &[K]) -> Vec<(K, Option<V>)> {
        keys.iter().map(|k| (k.clone(), self.get(k))).collect()
    }

    fn peek_many(&self, keys: &[K]) -> Vec<(K, Option<V>)> {
        keys.iter().map(|k| (k.clone(), self.peek(k))).collect()
    }

    fn has_many(&self, keys: &[K]) -> Vec<(K, bool)> {
        keys.iter().map(|k| (k.clone(), self.has(k))).collect()
    }

    fn delete_many(&mut self, keys: &[K]) -> Vec<(K, bool)> {
        keys.iter().map(|k| (k.clone(), self.delete(k))).collect()
    }
}

pub(crate) fn require_capacity(capacity: usize) -> Result<(), PolicyError> {
    if capacity == 0 {
        return Err(PolicyError::ZeroCapacity);
    }

    Ok(())
}

/// Lets a boxed trait object stand in for a concrete policy, which is what
/// the builder needs since the chosen algorithm is only known at runtime.
impl<K, V> EvictionPolicy<K, V> for Box<dyn EvictionPolicy<K, V>>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        (**self).set(key, value)
    }

    fn get(&mut self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn peek(&self, key: &K) -> Option<V> {
        (**self).peek(key)
    }

    fn delete(&mut self, key: &K) -> bool {
        (**self).delete(key)
    }

    fn purge(&mut self) {
        (**self).purge()
    }

    fn keys(&self) -> Vec<K> {
        (**self).keys()
    }

    fn values(&self) -> Vec<V> {
        (**self).values()
    }

    fn all(&self) -> Vec<(K, V)> {
        (**self).all()
    }

    fn range(&self, f: &mut dyn FnMut(&K, &V) -> bool) {
        (**self).range(f)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn algorithm(&self) -> &'static str {
        (**self).algorithm()
    }
}

/// Picks and constructs a concrete policy engine for the algorithm the
/// builder was configured with.
#[derive(Clone, Copy, Debug)]
pub enum Algorithm {
    Lru,
    Lfu { eviction_size: usize },
    Fifo,
    Sieve,
    TwoQ,
    Arc,
    TinyLfu,
    WTinyLfu,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Lru => "lru",
            Algorithm::Lfu { .. } => "lfu",
            Algorithm::Fifo => "fifo",
            Algorithm::Sieve => "sieve",
            Algorithm::TwoQ => "2q",
            Algorithm::Arc => "arc",
            Algorithm::TinyLfu => "tinylfu",
            Algorithm::WTinyLfu => "wtinylfu",
        }
    }

    pub fn build<K, V>(&self, capacity: usize) -> Result<Box<dyn EvictionPolicy<K, V>>, PolicyError>
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        Ok(match *self {
            Algorithm::Lru => Box::new(Lru::new(capacity)?),
            Algorithm::Lfu { eviction_size } => Box::new(Lfu::with_eviction_size(capacity, eviction_size)?),
            Algorithm::Fifo => Box::new(Fifo::new(capacity)?),
            Algorithm::Sieve => Box::new(Sieve::new(capacity)?),
            Algorithm::TwoQ => Box::new(TwoQ::new(capacity)?),
            Algorithm::Arc => Box::new(Arc::new(capacity)?),
            Algorithm::TinyLfu => Box::new(TinyLfu::new(capacity)?),
            Algorithm::WTinyLfu => Box::new(WTinyLfu::new(capacity)?),
        })
    }
}
