//! Count-min sketch and doorkeeper admission filter backing the TinyLFU
//! family of policies (see [`crate::policy::tinylfu`]).

use std::hash::{Hash, Hasher};
use rustc_hash::FxHasher;

const DEPTH: usize = 4;

/// A `d`-row, `w`-column count-min sketch of saturating `u8` counters.
/// `inc` performs a conservative update (only the minimum slot across all
/// rows is incremented); `estimate` returns that same minimum.
pub struct CountMinSketch {
    width: usize,
    rows: [Vec<u8>; DEPTH],
    seeds: [u64; DEPTH],
    additions: usize,
    reset_interval: usize,
}

impl CountMinSketch {
    /// `width` is rounded up to the next power of two. `reset_interval`
    /// bounds how many `inc` calls occur before all counters are halved
    /// (conservative aging); per spec.md this should be `10 * capacity`.
    pub fn new(width: usize, reset_interval: usize) -> Self {
        let width = width.next_power_of_two().max(16);

        let rows = std::array::from_fn(|_| vec![0_u8; width]);
        let seeds = [
            0x9E37_79B9_7F4A_7C15,
            0xC2B2_AE3D_27D4_EB4F,
            0x1656_67B1_9E37_79F9,
            0xFF51_AFD7_ED55_8CCD,
        ];

        CountMinSketch {
            width,
            rows,
            seeds,
            additions: 0,
            reset_interval: reset_interval.max(1),
        }
    }

    fn slot(&self, row: usize, hash: u64) -> usize {
        (hash ^ self.seeds[row].rotate_left(row as u32 * 17)) as usize & (self.width - 1)
    }

    fn hash_of<K: Hash>(key: &K) -> u64 {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Increments the conservative estimate for `key`, saturating at 255,
    /// and periodically halves all counters (conservative aging).
    pub fn inc<K: Hash>(&mut self, key: &K) {
        let hash = Self::hash_of(key);

        let min = (0..DEPTH)
            .map(|row| self.rows[row][self.slot(row, hash)])
            .min()
            .unwrap_or(0);

        if min < u8::MAX {
            for row in 0..DEPTH {
                let idx = self.slot(row, hash);

                if self.rows[row][idx] == min {
                    self.rows[row][idx] = min + 1;
                }
            }
        }

        self.additions += 1;

        if self.additions >= self.reset_interval {
            self.reset();
        }
    }

    pub fn estimate<K: Hash>(&self, key: &K) -> u8 {
        let hash = Self::hash_of(key);

        (0..DEPTH)
            .map(|row| self.rows[row][self.slot(row, hash)])
            .min()
            .unwrap_or(0)
    }

    /// Halves every counter. Called automatically by `inc`, exposed for
    /// tests and for callers that want to force aging.
    pub fn reset(&mut self) {
        for row in self.rows.iter_mut() {
            for count in row.iter_mut() {
                *count >>= 1;
            }
        }

        self.additions = 0;
    }
}

/// A one-shot admission bloom filter: a key must be seen twice before the
/// count-min sketch bothers tracking its frequency, which keeps one-off
/// scans from polluting the sketch. Cleared whenever the sketch resets.
pub struct Doorkeeper {
    bits: Vec<bool>,
    seeds: [u64; 2],
}

impl Doorkeeper {
    pub fn new(width: usize) -> Self {
        Doorkeeper {
            bits: vec![false; width.next_power_of_two().max(16)],
            seeds: [0x9E37_79B9_7F4A_7C15, 0xC2B2_AE3D_27D4_EB4F],
        }
    }

    fn indices<K: Hash>(&self, key: &K) -> [usize; 2] {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        let hash = hasher.finish();

        [
            (hash ^ self.seeds[0]) as usize & (self.bits.len() - 1),
            (hash ^ self.seeds[1]) as usize & (self.bits.len() - 1),
        ]
    }

    /// Returns `true` if `key` had already been marked (this is its second
    /// or later sighting); marks it unconditionally as a side effect.
    pub fn mark_and_check(&mut self, key: &impl Hash) -> bool {
        let indices = self.indices(key);
        let already_seen = indices.iter().all(|&i| self.bits[i]);

        for i in indices {
            self.bits[i] = true;
        }

        already_seen
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|bit| *bit = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tracks_repeated_increments() {
        let mut sketch = CountMinSketch::new(64, 1_000_000);

        for _ in 0..5 {
            sketch.inc(&"hot");
        }

        sketch.inc(&"cold");

        assert!(sketch.estimate(&"hot") >= 5);
        assert!(sketch.estimate(&"hot") > sketch.estimate(&"cold"));
    }

    #[test]
    fn reset_halves_counts() {
        let mut sketch = CountMinSketch::new(64, 1_000_000);

        for _ in 0..10 {
            sketch.inc(&"k");
        }

        let before = sketch.estimate(&"k");
        sketch.reset();
        let after = sketch.estimate(&"k");

        assert!(after <= before / 2 + 1);
    }

    #[test]
    fn auto_reset_after_interval() {
        let mut sketch = CountMinSketch::new(64, 4);

        sketch.inc(&"a");
        sketch.inc(&"a");
        sketch.inc(&"a");
        let before = sketch.estimate(&"a");
        sketch.inc(&"a");

        // the 4th increment should have triggered an automatic reset
        assert!(sketch.estimate(&"a") <= before);
    }

    #[test]
    fn doorkeeper_admits_on_second_sighting() {
        let mut doorkeeper = Doorkeeper::new(64);

        assert!(!doorkeeper.mark_and_check(&"k"));
        assert!(doorkeeper.mark_and_check(&"k"));
    }
}
