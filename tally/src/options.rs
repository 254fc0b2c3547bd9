//! Per-call options for recording, fetching, and flushing

use crate::measurement::MeasurementRecord;

/// Options for [`Aggregator::measure_with`](crate::Aggregator::measure_with) and friends.
///
/// ```
/// use tally::MeasureOptions;
///
/// let user_id = 42;
/// let options = MeasureOptions::new().source(user_id).percentiles([95.0, 99.0]);
/// assert_eq!(options.source.as_deref(), Some("42"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureOptions {
    /// Source tag attached to the record.
    pub source: Option<String>,
    /// Percentiles to track for this metric. Any entry enables the `(name, source)` reservoir.
    pub percentiles: Vec<f64>,
}

impl MeasureOptions {
    /// Options with no source and no percentile tracking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the record with `source`, stringified.
    pub fn source(mut self, source: impl ToString) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Track one more percentile.
    pub fn percentile(mut self, p: f64) -> Self {
        self.percentiles.push(p);
        self
    }

    /// Track several more percentiles.
    pub fn percentiles(mut self, ps: impl IntoIterator<Item = f64>) -> Self {
        self.percentiles.extend(ps);
        self
    }

    pub(crate) fn tracks_percentiles(&self) -> bool {
        !self.percentiles.is_empty()
    }
}

/// Options for [`Aggregator::fetch`](crate::Aggregator::fetch).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    /// Only match records tagged with this source. Ignored for percentile lookups.
    pub source: Option<String>,
    /// Return this percentile of the sourceless reservoir instead of a record.
    pub percentile: Option<f64>,
}

impl FetchOptions {
    /// Options matching sourceless records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match records tagged with `source`, stringified.
    pub fn source(mut self, source: impl ToString) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Ask for a percentile instead of a record.
    pub fn percentile(mut self, p: f64) -> Self {
        self.percentile = Some(p);
        self
    }
}

/// Options for [`Aggregator::flush_to`](crate::Aggregator::flush_to).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOptions {
    /// Keep the flushed records buffered instead of clearing them.
    pub preserve: bool,
}

impl FlushOptions {
    /// Flush and clear.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flush but keep the records buffered.
    pub fn preserve() -> Self {
        Self { preserve: true }
    }
}

/// Result of [`Aggregator::fetch`](crate::Aggregator::fetch).
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// The first buffered record matching the requested name and source.
    Measurement(MeasurementRecord),
    /// A percentile computed from a reservoir.
    Percentile(f64),
}

impl Fetched {
    /// The record, if this is one.
    pub fn into_measurement(self) -> Option<MeasurementRecord> {
        match self {
            Self::Measurement(record) => Some(record),
            Self::Percentile(_) => None,
        }
    }

    /// The percentile value, if this is one.
    pub fn as_percentile(&self) -> Option<f64> {
        match self {
            Self::Percentile(p) => Some(*p),
            Self::Measurement(_) => None,
        }
    }
}
