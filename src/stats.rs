//! Running counters and a point-in-time snapshot (supplementing spec.md
//! §6.3's metrics contract with a cheap in-process equivalent that doesn't
//! require wiring up a `Collector`). Grounded on the teacher's
//! `status.rs`/`stats.rs`: atomic counters updated off the hot path's
//! return value, snapshotted into a plain struct on demand.

use std::sync::atomic::{AtomicU64, Ordering};

use num_traits::AsPrimitive;

#[derive(Default)]
pub struct AtomicStats {
    insertions: AtomicU64,
    evictions_capacity: AtomicU64,
    evictions_ttl: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AtomicStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_insertion(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self, reason: crate::locked::EvictionReason) {
        match reason {
            crate::locked::EvictionReason::Capacity => self.evictions_capacity.fetch_add(1, Ordering::Relaxed),
            crate::locked::EvictionReason::Ttl => self.evictions_ttl.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, len: usize, capacity: usize, algorithm: &'static str) -> CacheStats {
        CacheStats {
            len,
            capacity,
            algorithm,
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions_capacity: self.evictions_capacity.load(Ordering::Relaxed),
            evictions_ttl: self.evictions_ttl.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// A consistent point-in-time view of a cache's counters, for diagnostics
/// or logging outside of the `Collector` path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
    pub algorithm: &'static str,
    pub insertions: u64,
    pub evictions_capacity: u64,
    pub evictions_ttl: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;

        if total == 0 {
            0.0
        } else {
            self.hits.as_() / total.as_()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locked::EvictionReason;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let stats = AtomicStats::new();

        stats.record_insertion();
        stats.record_insertion();
        stats.record_hit();
        stats.record_miss();
        stats.record_eviction(EvictionReason::Capacity);
        stats.record_eviction(EvictionReason::Ttl);

        let snapshot = stats.snapshot(5, 10, "lru");

        assert_eq!(snapshot.insertions, 2);
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.evictions_capacity, 1);
        assert_eq!(snapshot.evictions_ttl, 1);
        assert_eq!(snapshot.hit_ratio(), 0.5);
    }

    #[test]
    fn hit_ratio_is_zero_with_no_traffic() {
        let stats = AtomicStats::new();
        assert_eq!(stats.snapshot(0, 1, "lru").hit_ratio(), 0.0);
    }
}
