//! Injectable random source shared by all randomized components.

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Thread-safe random source.
///
/// Production uses [`Entropy::system`]; tests seed with
/// [`Entropy::from_seed`] to force deterministic sequences.
pub struct Entropy {
    rng: Mutex<StdRng>,
}

impl Entropy {
    pub fn system() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Uniform draw in `[lo, hi]`. Degenerate ranges return `lo`.
    pub fn range_f64(&self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        self.rng.lock().gen_range(lo..=hi)
    }

    /// Uniform draw in `[lo, hi]`. Degenerate ranges return `lo`.
    pub fn range_u64(&self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        self.rng.lock().gen_range(lo..=hi)
    }

    /// Uniform draw in `[0, n)`; `n` must be non-zero.
    pub fn index(&self, n: usize) -> usize {
        debug_assert!(n > 0);
        self.rng.lock().gen_range(0..n)
    }

    /// True with probability `p` (clamped to [0,1]).
    pub fn chance(&self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.rng.lock().gen_bool(p)
    }

    /// Uniform pick from a slice; `None` when empty.
    pub fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            items.get(self.index(items.len()))
        }
    }
}
