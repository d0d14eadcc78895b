//! Request coalescing (spec.md §4.8): concurrent callers loading the same
//! key share one in-flight loader invocation instead of each starting their
//! own. Grounded on the teacher's `worker/manager.rs` fan-out pattern
//! (one owner per key, everyone else waits on a shared handle) but
//! implemented with `parking_lot::Condvar` rather than a channel, since
//! here the "owner" is whichever caller's thread happens to win the race
//! to insert the in-flight marker, not a fixed background worker.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

enum Slot<V, E> {
    InFlight,
    Done(Result<V, E>),
}

struct Shared<V, E> {
    mutex: Mutex<Option<Slot<V, E>>>,
    condvar: Condvar,
}

/// Deduplicates concurrent loads for the same key. One `Group` instance is
/// shared by an entire high-level cache; `run` determines, for each call,
/// whether to execute `f` or wait for another in-flight call's result.
pub struct Group<K, V, E> {
    in_flight: Mutex<HashMap<K, Arc<Shared<V, E>>>>,
}

impl<K, V, E> Default for Group<K, V, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Group {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V, E> Group<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` if no call for `key` is currently in flight, otherwise
    /// blocks until the in-flight call completes and returns its result.
    /// Exactly one `f` invocation happens per batch of concurrent callers.
    pub fn run(&self, key: K, f: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        let shared = {
            let mut in_flight = self.in_flight.lock();

            if let Some(existing) = in_flight.get(&key) {
                existing.clone()
            } else {
                let shared = Arc::new(Shared {
                    mutex: Mutex::new(Some(Slot::InFlight)),
                    condvar: Condvar::new(),
                });

                in_flight.insert(key.clone(), shared.clone());
                return self.own(key, shared, f);
            }
        };

        self.wait(shared)
    }

    fn own(&self, key: K, shared: Arc<Shared<V, E>>, f: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        let result = f();

        {
            let mut slot = shared.mutex.lock();
            *slot = Some(Slot::Done(result.clone()));
        }
        shared.condvar.notify_all();

        self.in_flight.lock().remove(&key);

        result
    }

    fn wait(&self, shared: Arc<Shared<V, E>>) -> Result<V, E> {
        let mut slot = shared.mutex.lock();

        loop {
            match slot.as_ref().expect("slot is always Some while shared") {
                Slot::Done(result) => return result.clone(),
                Slot::InFlight => shared.condvar.wait(&mut slot),
            }
        }
    }
}
