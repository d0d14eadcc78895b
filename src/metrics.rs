//! Metrics instrumentation (spec.md §6.3): a small `Collector` trait the
//! high-level cache drives on every operation, with a no-op default and an
//! optional adapter onto the `metrics` facade (gated behind the
//! `prometheus` feature, the crate sibling example repo `foyer` uses for
//! the same purpose). The concrete Prometheus exporter wiring is the
//! embedding application's concern, not this crate's.

/// Why an eviction happened, passed through to [`Collector::eviction`] so a
/// collector can label the counter (spec.md §6.3 `eviction_total{reason}`).
pub use crate::locked::EvictionReason;

/// Receives cache events. Implementations must be cheap and non-blocking:
/// they are called with no lock held, but on the calling thread, for every
/// cache operation.
pub trait Collector: Send + Sync {
    fn insertion(&self) {}
    fn eviction(&self, _reason: EvictionReason) {}
    fn hit(&self) {}
    fn miss(&self) {}

    /// Gauges, sampled periodically by the caller rather than pushed on
    /// every operation (spec.md §6.3): current size in bytes, item count.
    fn size_bytes(&self, _bytes: u64) {}
    fn length(&self, _len: usize) {}
}

/// The default collector: every event is discarded.
#[derive(Default, Clone, Copy)]
pub struct NoopCollector;

impl Collector for NoopCollector {}

#[cfg(feature = "prometheus")]
pub use prometheus_adapter::PrometheusCollector;

#[cfg(feature = "prometheus")]
mod prometheus_adapter {
    use super::{Collector, EvictionReason};

    /// Forwards every event to the process-global `metrics` recorder under
    /// a fixed name prefix. Registering an actual Prometheus exporter
    /// (`metrics_exporter_prometheus::PrometheusBuilder`) is left to the
    /// embedding application, per spec.md's non-goals.
    pub struct PrometheusCollector {
        prefix: &'static str,
    }

    impl PrometheusCollector {
        pub fn new(prefix: &'static str) -> Self {
            PrometheusCollector { prefix }
        }
    }

    impl Collector for PrometheusCollector {
        fn insertion(&self) {
            metrics::counter!(format!("{}_insertion_total", self.prefix)).increment(1);
        }

        fn eviction(&self, reason: EvictionReason) {
            let label = match reason {
                EvictionReason::Capacity => "capacity",
                EvictionReason::Ttl => "ttl",
            };

            metrics::counter!(format!("{}_eviction_total", self.prefix), "reason" => label).increment(1);
        }

        fn hit(&self) {
            metrics::counter!(format!("{}_hit_total", self.prefix)).increment(1);
        }

        fn miss(&self) {
            metrics::counter!(format!("{}_miss_total", self.prefix)).increment(1);
        }

        fn size_bytes(&self, bytes: u64) {
            metrics::gauge!(format!("{}_size_bytes", self.prefix)).set(bytes as f64);
        }

        fn length(&self, len: usize) {
            metrics::gauge!(format!("{}_length", self.prefix)).set(len as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCollector {
        hits: AtomicUsize,
        misses: AtomicUsize,
        evictions: AtomicUsize,
    }

    impl Collector for CountingCollector {
        fn hit(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }

        fn miss(&self) {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }

        fn eviction(&self, _reason: EvictionReason) {
            self.evictions.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_collector_accepts_every_event_silently() {
        let collector = NoopCollector;
        collector.insertion();
        collector.eviction(EvictionReason::Capacity);
        collector.hit();
        collector.miss();
        collector.size_bytes(128);
        collector.length(4);
    }

    #[test]
    fn custom_collector_observes_events() {
        let collector = CountingCollector::default();

        collector.hit();
        collector.hit();
        collector.miss();
        collector.eviction(EvictionReason::Ttl);

        assert_eq!(collector.hits.load(Ordering::SeqCst), 2);
        assert_eq!(collector.misses.load(Ordering::SeqCst), 1);
        assert_eq!(collector.evictions.load(Ordering::SeqCst), 1);
    }
}
