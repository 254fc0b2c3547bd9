use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use super::Clock;

/// Clock that stands still until it is advanced.
///
/// Clones share the same instant, so a test can keep one handle and give the other to an
/// [`Aggregator`](crate::Aggregator).
///
/// ```
/// use std::time::Duration;
/// use tally::time::{TimeSource, fakes::ManualClock};
///
/// let clock = ManualClock::new();
/// let ts = TimeSource::custom(clock.clone());
/// let ((), elapsed) = ts.measure(|| clock.advance(Duration::from_millis(25)));
/// assert_eq!(elapsed, Duration::from_millis(25));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<Instant>>);

impl ManualClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    /// Move the clock forward by `elapsed`.
    pub fn advance(&self, elapsed: Duration) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) += elapsed;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn instant(&self) -> Instant {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
