//! Monotonic nanosecond time source.
//!
//! All expiry comparisons in this crate go through [`Clock`] rather than
//! `SystemTime`, so they are immune to wall-clock jumps (NTP steps, manual
//! clock changes). The default [`Clock::monotonic`] is backed by
//! [`std::time::Instant`]; tests substitute [`Clock::offset`] to control time
//! deterministically without sleeping.

use std::sync::Arc;
use std::time::Instant;

/// A source of monotonic nanosecond timestamps.
///
/// Cloning a `Clock` is cheap; all clones backed by [`Clock::monotonic`]
/// share the same epoch `Instant`.
#[derive(Clone)]
pub struct Clock {
    inner: Arc<dyn Fn() -> i64 + Send + Sync>,
}

impl Clock {
    /// A clock backed by the process's monotonic `Instant`, nanoseconds
    /// since the clock was created.
    pub fn monotonic() -> Self {
        let epoch = Instant::now();

        Clock {
            inner: Arc::new(move || epoch.elapsed().as_nanos() as i64),
        }
    }

    /// A clock that reports a fixed offset from a shared monotonic base,
    /// advanced by calling the returned [`ClockHandle`]. Intended for tests.
    pub fn offset() -> (Self, ClockHandle) {
        use std::sync::atomic::{AtomicI64, Ordering};

        let now = Arc::new(AtomicI64::new(0));
        let reader = now.clone();

        let clock = Clock {
            inner: Arc::new(move || reader.load(Ordering::Acquire)),
        };

        (clock, ClockHandle { now })
    }

    /// The current time in nanoseconds, relative to this clock's epoch.
    pub fn now_ns(&self) -> i64 {
        (self.inner)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::monotonic()
    }
}

/// Advances a [`Clock`] created with [`Clock::offset`].
pub struct ClockHandle {
    now: Arc<std::sync::atomic::AtomicI64>,
}

impl ClockHandle {
    pub fn advance_ns(&self, delta_ns: i64) {
        self.now.fetch_add(delta_ns, std::sync::atomic::Ordering::AcqRel);
    }

    pub fn set_ns(&self, value_ns: i64) {
        self.now.store(value_ns, std::sync::atomic::Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_clock_advances_deterministically() {
        let (clock, handle) = Clock::offset();
        assert_eq!(clock.now_ns(), 0);

        handle.advance_ns(1_000);
        assert_eq!(clock.now_ns(), 1_000);

        handle.set_ns(42);
        assert_eq!(clock.now_ns(), 42);
    }
}
