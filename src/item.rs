//! The per-entry item model (spec.md §4.5): a value (or its deliberate
//! absence, for negative caching) plus the two expiry timestamps that drive
//! TTL and stale-while-revalidate.

use rand::Rng;

/// TTL jitter parameters (spec.md §4.5, §6.1 `jitter(lambda, upper_bound)`).
/// Applied once, at item-creation time, never at configuration time.
#[derive(Clone, Copy, Debug, Default)]
pub struct Jitter {
    pub lambda: f64,
    pub upper_ns: i64,
}

impl Jitter {
    pub const NONE: Jitter = Jitter { lambda: 0.0, upper_ns: 0 };

    pub fn is_enabled(&self) -> bool {
        self.lambda > 0.0 && self.upper_ns > 0
    }

    /// `ttl * (1 - exp(-lambda * u))`, `u` drawn uniformly from `[0, upper)`.
    /// Returns `ttl_ns` unchanged if jitter isn't configured.
    pub fn apply(&self, ttl_ns: i64, rng: &mut impl Rng) -> i64 {
        if !self.is_enabled() || ttl_ns <= 0 {
            return ttl_ns;
        }

        let u = rng.gen_range(0.0..self.upper_ns as f64);
        self.apply_with_u(ttl_ns, u)
    }

    /// Deterministic variant taking `u` directly, used by tests to check
    /// the jitter formula without relying on RNG output.
    pub fn apply_with_u(&self, ttl_ns: i64, u: f64) -> i64 {
        if !self.is_enabled() || ttl_ns <= 0 {
            return ttl_ns;
        }

        let v = 1.0 - (-self.lambda * u).exp();
        (ttl_ns as f64 * v) as i64
    }
}

/// A cached entry: either a present value or a negative (known-absent)
/// marker, each carrying its own expiry/stale timestamps.
///
/// `expiry_ns == 0` means "never expires" (and implies `stale_expiry_ns ==
/// 0`); otherwise `stale_expiry_ns >= expiry_ns`.
#[derive(Clone, Debug)]
pub struct Item<V> {
    value: Option<V>,
    expiry_ns: i64,
    stale_expiry_ns: i64,
}

impl<V> Item<V> {
    pub fn with_value(value: V, now_ns: i64, ttl_ns: i64, stale_ns: i64, jitter: &Jitter, rng: &mut impl Rng) -> Self {
        let (expiry_ns, stale_expiry_ns) = expiry_fields(now_ns, ttl_ns, stale_ns, jitter, rng);

        Item {
            value: Some(value),
            expiry_ns,
            stale_expiry_ns,
        }
    }

    pub fn no_value(now_ns: i64, ttl_ns: i64, stale_ns: i64, jitter: &Jitter, rng: &mut impl Rng) -> Self {
        let (expiry_ns, stale_expiry_ns) = expiry_fields(now_ns, ttl_ns, stale_ns, jitter, rng);

        Item {
            value: None,
            expiry_ns,
            stale_expiry_ns,
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<V> {
        self.value
    }

    pub fn expiry_ns(&self) -> i64 {
        self.expiry_ns
    }

    pub fn stale_expiry_ns(&self) -> i64 {
        self.stale_expiry_ns
    }

    /// An item is expired only once both the TTL *and* the stale window
    /// have elapsed.
    pub fn is_expired(&self, now_ns: i64) -> bool {
        self.expiry_ns > 0 && now_ns > self.stale_expiry_ns
    }

    /// `true` while the item is within its stale-while-revalidate window:
    /// TTL has elapsed but the stale window hasn't.
    pub fn should_revalidate(&self, now_ns: i64) -> bool {
        self.expiry_ns > 0 && now_ns > self.expiry_ns && now_ns < self.stale_expiry_ns
    }
}

fn expiry_fields(now_ns: i64, ttl_ns: i64, stale_ns: i64, jitter: &Jitter, rng: &mut impl Rng) -> (i64, i64) {
    if ttl_ns == 0 {
        return (0, 0);
    }

    let expiry_ns = now_ns + jitter.apply(ttl_ns, rng);
    let stale_expiry_ns = expiry_ns + stale_ns;

    (expiry_ns, stale_expiry_ns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn never_expires_when_ttl_is_zero() {
        let item = Item::with_value(1, 0, 0, 0, &Jitter::NONE, &mut thread_rng());

        assert_eq!(item.expiry_ns(), 0);
        assert_eq!(item.stale_expiry_ns(), 0);
        assert!(!item.is_expired(i64::MAX));
    }

    #[test]
    fn expiry_and_stale_window_without_jitter() {
        let item = Item::with_value(1, 0, 100, 50, &Jitter::NONE, &mut thread_rng());

        assert_eq!(item.expiry_ns(), 100);
        assert_eq!(item.stale_expiry_ns(), 150);

        assert!(!item.is_expired(149));
        assert!(item.is_expired(151));

        assert!(!item.should_revalidate(99));
        assert!(item.should_revalidate(101));
        assert!(!item.should_revalidate(151));
    }

    #[test]
    fn jitter_formula_matches_spec() {
        let jitter = Jitter { lambda: 1.0, upper_ns: 10 };
        let ttl_ns = 1000;

        let u = 5.0;
        let expected = (ttl_ns as f64 * (1.0 - (-1.0_f64 * u).exp())) as i64;

        assert_eq!(jitter.apply_with_u(ttl_ns, u), expected);
        assert!(jitter.apply_with_u(ttl_ns, u) < ttl_ns);
        assert!(jitter.apply_with_u(ttl_ns, u) >= 0);
    }

    #[test]
    fn disabled_jitter_is_identity() {
        assert_eq!(Jitter::NONE.apply_with_u(500, 3.0), 500);
    }

    #[test]
    fn no_value_item_never_surfaces_a_value() {
        let item: Item<u32> = Item::no_value(0, 100, 0, &Jitter::NONE, &mut thread_rng());

        assert!(!item.has_value());
        assert_eq!(item.value(), None);
    }
}
