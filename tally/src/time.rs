//! Clock used to time computations passed to [`Aggregator::time`](crate::Aggregator::time)

use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant},
};

/// Fake clocks for testing
///
/// To enable this module, you must enable the `test-util` feature.
#[cfg(feature = "test-util")]
pub mod fakes;

/// A monotonic clock.
///
/// Implement this to control how block timings are measured, e.g. in tests.
pub trait Clock: Send + Sync + Debug {
    /// The current instant.
    fn instant(&self) -> Instant;
}

/// The clock an [`Aggregator`](crate::Aggregator) reads when timing a computation.
#[derive(Clone, Default)]
pub enum TimeSource {
    /// [`Instant::now`].
    #[default]
    System,
    /// A user-provided clock.
    Custom(Arc<dyn Clock>),
}

impl TimeSource {
    /// Wrap a custom clock.
    pub fn custom(clock: impl Clock + 'static) -> Self {
        Self::Custom(Arc::new(clock))
    }

    /// The current instant according to this source.
    pub fn instant(&self) -> Instant {
        match self {
            Self::System => Instant::now(),
            Self::Custom(clock) => clock.instant(),
        }
    }

    /// Run `f`, returning its output and how long it took.
    pub fn measure<T>(&self, f: impl FnOnce() -> T) -> (T, Duration) {
        let start = self.instant();
        let output = f();
        (output, self.instant().saturating_duration_since(start))
    }
}

impl Debug for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "TimeSource::System"),
            Self::Custom(_) => write!(f, "TimeSource::Custom(...)"),
        }
    }
}

/// Whole milliseconds in `elapsed`, truncated, as a measurement value.
pub(crate) fn whole_millis(elapsed: Duration) -> f64 {
    elapsed.as_millis() as f64
}
