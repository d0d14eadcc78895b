//! Background TTL sweeper (spec.md §4.6.5). Grounded on the teacher's
//! `worker/ttl/mod.rs` and `worker/ttl/expiries.rs`: a `BTreeMap` keyed by
//! expiry timestamp lets the sweep find everything due without scanning
//! the whole cache, and the background thread sleeps adaptively based on
//! how soon the next expiry is rather than polling at a fixed interval.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};

use crate::clock::Clock;

/// Tracks, per expiry timestamp, the set of keys due to expire at that
/// instant. Mirrors the teacher's `Expiries<K, S>`.
pub struct ExpiryIndex<K> {
    by_expiry: BTreeMap<i64, HashSet<K>>,
}

impl<K> Default for ExpiryIndex<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        ExpiryIndex {
            by_expiry: BTreeMap::new(),
        }
    }
}

impl<K> ExpiryIndex<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, key: K, stale_expiry_ns: i64) {
        if stale_expiry_ns <= 0 {
            return;
        }

        self.by_expiry.entry(stale_expiry_ns).or_default().insert(key);
    }

    pub fn untrack(&mut self, key: &K, stale_expiry_ns: i64) {
        if let Some(set) = self.by_expiry.get_mut(&stale_expiry_ns) {
            set.remove(key);

            if set.is_empty() {
                self.by_expiry.remove(&stale_expiry_ns);
            }
        }
    }

    /// Removes and returns every key whose tracked expiry is `<= now_ns`.
    pub fn drain_expired(&mut self, now_ns: i64) -> Vec<K> {
        let due: Vec<i64> = self.by_expiry.range(..=now_ns).map(|(&ts, _)| ts).collect();

        let mut expired = Vec::new();

        for ts in due {
            if let Some(keys) = self.by_expiry.remove(&ts) {
                expired.extend(keys);
            }
        }

        expired
    }

    /// The timestamp of the earliest pending expiry, if any.
    pub fn next_deadline(&self) -> Option<i64> {
        self.by_expiry.keys().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_expiry.is_empty()
    }
}

/// A background thread that periodically asks a sweep closure to evict
/// everything due, sleeping for the gap until the next known deadline
/// (capped by `max_idle`) instead of polling at a fixed tick.
pub struct Janitor {
    shutdown: Sender<()>,
    handle: Option<std::thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl Janitor {
    /// `sweep` is called on every wake-up; it returns the next known
    /// deadline in nanoseconds (per the same [`Clock`]), or `None` if
    /// nothing is pending, in which case the janitor sleeps `max_idle`.
    pub fn spawn(
        clock: Clock,
        max_idle: Duration,
        min_sleep: Duration,
        mut sweep: impl FnMut(i64) -> Option<i64> + Send + 'static,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();

        let handle = std::thread::Builder::new()
            .name("cache-janitor".into())
            .spawn(move || {
                while running_thread.load(Ordering::Acquire) {
                    let next_deadline = sweep(clock.now_ns());

                    let delay = match next_deadline {
                        Some(deadline_ns) => {
                            let remaining_ns = (deadline_ns - clock.now_ns()).max(0);
                            Duration::from_nanos(remaining_ns as u64).clamp(min_sleep, max_idle)
                        }
                        None => max_idle,
                    };

                    if shutdown_rx.recv_timeout(delay).is_ok() {
                        break;
                    }
                }
            })
            .expect("failed to spawn cache-janitor thread");

        Janitor {
            shutdown: shutdown_tx,
            handle: Some(handle),
            running,
        }
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        let _ = self.shutdown.send(());

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn expiry_index_drains_only_what_is_due() {
        let mut index = ExpiryIndex::new();

        index.track("a", 100);
        index.track("b", 200);
        index.track("c", 300);

        let due = index.drain_expired(200);
        let mut due = due;
        due.sort();

        assert_eq!(due, vec!["a", "b"]);
        assert_eq!(index.next_deadline(), Some(300));
    }

    #[test]
    fn untrack_removes_a_single_key_without_disturbing_others() {
        let mut index = ExpiryIndex::new();

        index.track("a", 100);
        index.track("b", 100);
        index.untrack(&"a", 100);

        assert_eq!(index.drain_expired(100), vec!["b"]);
    }

    #[test]
    fn janitor_sweeps_in_the_background() {
        let swept = Arc::new(AtomicUsize::new(0));
        let swept_thread = swept.clone();

        let janitor = Janitor::spawn(Clock::monotonic(), Duration::from_millis(20), Duration::from_millis(1), move |_now| {
            swept_thread.fetch_add(1, Ordering::SeqCst);
            None
        });

        std::thread::sleep(Duration::from_millis(60));
        drop(janitor);

        assert!(swept.load(Ordering::SeqCst) >= 1);
    }
}
