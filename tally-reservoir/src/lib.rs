#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::fmt;

use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

mod error;
pub use error::Error;

/// Number of values a [`Reservoir`] keeps when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 1000;

/// A fixed-capacity uniform random sample of a stream of numbers.
///
/// The first `capacity` values are kept as-is. After that, the `i`-th value is kept with
/// probability `capacity / i`, replacing a uniformly chosen slot (Vitter's algorithm R), so
/// every value observed so far has the same chance of being in the sample.
///
/// Percentile queries sort a copy of the sample and never reorder the stored values.
///
/// The reservoir is not internally synchronized; wrap it in a lock to share it.
pub struct Reservoir<R = StdRng> {
    values: Vec<f64>,
    capacity: usize,
    seen: u64,
    rng: R,
}

impl Reservoir {
    /// Create a reservoir holding at most `capacity` values, seeded from the OS.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }
}

impl Default for Reservoir {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<R: RngCore> Reservoir<R> {
    /// Like [`Reservoir::new`], but also specify the random number generator.
    ///
    /// This is useful to seed the generator for deterministic tests; normally you should be
    /// using [`Reservoir::new`].
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_rng(capacity: usize, rng: R) -> Self {
        assert!(capacity > 0, "reservoir capacity must be positive");
        Self {
            values: Vec::new(),
            capacity,
            seen: 0,
            rng,
        }
    }

    /// Offer a value to the sample.
    pub fn insert(&mut self, value: f64) {
        self.seen += 1;
        if self.values.len() < self.capacity {
            self.values.push(value);
            return;
        }

        // `seen` > capacity here, so the slot lands in the sample with probability capacity / seen
        let slot = self.rng.random_range(0..self.seen);
        if let Some(existing) = usize::try_from(slot)
            .ok()
            .and_then(|slot| self.values.get_mut(slot))
        {
            *existing = value;
        }
    }

    /// Return the nearest-rank `p`-th percentile of the current sample.
    ///
    /// `p` must lie in `(0, 100]`. The result is the value at rank `⌈p / 100 × len⌉` of the
    /// sorted sample.
    ///
    /// ```
    /// use tally_reservoir::Reservoir;
    ///
    /// let mut reservoir = Reservoir::new(10);
    /// for v in [15.0, 20.0, 35.0, 40.0, 50.0] {
    ///     reservoir.insert(v);
    /// }
    /// assert_eq!(reservoir.percentile(40.0).unwrap(), 20.0);
    /// assert_eq!(reservoir.percentile(100.0).unwrap(), 50.0);
    /// ```
    pub fn percentile(&self, p: f64) -> Result<f64, Error> {
        let sorted = self.sorted()?;
        nearest_rank(&sorted, p)
    }

    /// Query several percentiles while sorting the sample only once.
    pub fn percentiles(&self, ps: &[f64]) -> Result<Vec<f64>, Error> {
        let sorted = self.sorted()?;
        ps.iter().map(|&p| nearest_rank(&sorted, p)).collect()
    }

    fn sorted(&self) -> Result<Vec<f64>, Error> {
        if self.values.is_empty() {
            return Err(Error::EmptySample);
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        Ok(sorted)
    }
}

impl<R> Reservoir<R> {
    /// Number of values currently held in the sample.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value has been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Maximum number of values held in the sample.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of values ever offered via [`Reservoir::insert`].
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// The sample in slot order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Drop the sample and start over, keeping the capacity and generator.
    pub fn clear(&mut self) {
        self.values.clear();
        self.seen = 0;
    }
}

impl<R> fmt::Debug for Reservoir<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservoir")
            .field("capacity", &self.capacity)
            .field("len", &self.values.len())
            .field("seen", &self.seen)
            .finish_non_exhaustive()
    }
}

fn nearest_rank(sorted: &[f64], p: f64) -> Result<f64, Error> {
    if !(p > 0.0 && p <= 100.0) {
        return Err(Error::InvalidPercentile(p));
    }
    // multiply before dividing so integral percentiles land on exact ranks
    let rank = (p * sorted.len() as f64 / 100.0).ceil() as usize;
    let idx = rank.clamp(1, sorted.len()) - 1;
    Ok(sorted[idx])
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{Error, Reservoir, nearest_rank};

    #[test]
    fn rank_multiplies_before_dividing() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        // 0.29 * 100 is not exactly 29 in floating point
        check!(nearest_rank(&sorted, 29.0) == Ok(29.0));
        check!(nearest_rank(&sorted, 0.5) == Ok(1.0));
    }

    #[test]
    fn rejects_out_of_range_percentiles() {
        let sorted = [1.0];
        check!(nearest_rank(&sorted, 0.0) == Err(Error::InvalidPercentile(0.0)));
        check!(nearest_rank(&sorted, 100.5) == Err(Error::InvalidPercentile(100.5)));
        let_assert!(Err(Error::InvalidPercentile(p)) = nearest_rank(&sorted, f64::NAN));
        check!(p.is_nan());
    }

    #[test]
    fn query_does_not_reorder_sample() {
        let mut reservoir = Reservoir::with_rng(4, ChaCha8Rng::seed_from_u64(7));
        for v in [9.0, 3.0, 7.0, 1.0] {
            reservoir.insert(v);
        }
        check!(reservoir.percentile(50.0) == Ok(3.0));
        check!(reservoir.values() == [9.0, 3.0, 7.0, 1.0]);
    }

    #[test]
    fn clear_resets_counts() {
        let mut reservoir = Reservoir::with_rng(2, ChaCha8Rng::seed_from_u64(1));
        reservoir.insert(1.0);
        reservoir.insert(2.0);
        reservoir.insert(3.0);
        reservoir.clear();
        check!(reservoir.is_empty());
        check!(reservoir.seen() == 0);
        check!(reservoir.percentile(50.0) == Err(Error::EmptySample));
    }

    #[test]
    #[should_panic(expected = "reservoir capacity must be positive")]
    fn zero_capacity_panics() {
        Reservoir::new(0);
    }
}
