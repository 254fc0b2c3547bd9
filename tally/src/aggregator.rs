//! The shared aggregation cache and its record/fetch/flush protocol

use std::sync::{Mutex, MutexGuard};

use crate::error::Error;
use crate::measurement::{MeasureKind, MeasurementQueue, MeasurementRecord, MeasurementStore};
use crate::options::{FetchOptions, Fetched, FlushOptions, MeasureOptions};
use crate::percentile::{PercentileKey, PercentileRegistry};
use crate::queue::DeliveryQueue;
use crate::time::{TimeSource, whole_millis};

/// Reservoir capacity used when none is configured.
pub const DEFAULT_RESERVOIR_CAPACITY: usize = tally_reservoir::DEFAULT_CAPACITY;

/// Thread-safe buffer of measurements, plus percentile reservoirs for selected metrics.
///
/// Producers call [`measure`](Self::measure) or [`time`](Self::time) from any thread; a flusher
/// periodically moves the buffered records to a [`DeliveryQueue`] with
/// [`flush_to`](Self::flush_to). Every operation on the buffer and the reservoirs runs under one
/// lock. The lock is never held while a timed computation runs or while a queue merges a batch.
///
/// Flushing clears buffered records but keeps percentile reservoirs, so percentiles describe the
/// whole lifetime of the aggregator.
///
/// ```
/// use tally::{Aggregator, FetchOptions, MeasureOptions, Queued};
///
/// let aggregator = Aggregator::new();
/// aggregator.measure_with("latency", 120, &MeasureOptions::new().source("api").percentile(95.0));
///
/// let record = aggregator.fetch("latency", &FetchOptions::new().source("api"));
/// assert!(record.is_some());
/// assert!(aggregator.get("latency").is_none());
///
/// let mut queue = Queued::default();
/// aggregator.flush_to(&mut queue, &Default::default());
/// assert_eq!(queue.gauges.len(), 1);
/// assert!(aggregator.is_empty());
/// ```
#[derive(Debug)]
pub struct Aggregator<S = MeasurementQueue> {
    cache: Mutex<Cache<S>>,
    time_source: TimeSource,
}

#[derive(Debug)]
struct Cache<S> {
    store: S,
    percentiles: PercentileRegistry,
}

/// Builder for an [`Aggregator`].
#[derive(Debug)]
pub struct AggregatorBuilder {
    prefix: Option<String>,
    reservoir_capacity: usize,
    time_source: TimeSource,
}

impl Default for AggregatorBuilder {
    fn default() -> Self {
        Self {
            prefix: None,
            reservoir_capacity: DEFAULT_RESERVOIR_CAPACITY,
            time_source: TimeSource::System,
        }
    }
}

impl AggregatorBuilder {
    /// Prefix prepended to metric names when batches are delivered.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Number of values each percentile reservoir keeps.
    ///
    /// Defaults to 1,000.
    pub fn reservoir_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "reservoir capacity must be positive");
        self.reservoir_capacity = capacity;
        self
    }

    /// Clock used by [`Aggregator::time`].
    ///
    /// Defaults to [`TimeSource::System`].
    pub fn time_source(mut self, time_source: TimeSource) -> Self {
        self.time_source = time_source;
        self
    }

    /// Build an aggregator backed by a [`MeasurementQueue`].
    pub fn build(self) -> Aggregator {
        let store = MeasurementQueue::default();
        self.build_with_store(store)
    }

    /// Build an aggregator backed by `store`.
    ///
    /// A prefix configured on the builder replaces the store's own.
    pub fn build_with_store<S: MeasurementStore>(self, mut store: S) -> Aggregator<S> {
        if let Some(prefix) = self.prefix {
            store.set_prefix(Some(prefix));
        }
        Aggregator {
            cache: Mutex::new(Cache {
                store,
                percentiles: PercentileRegistry::new(self.reservoir_capacity),
            }),
            time_source: self.time_source,
        }
    }
}

impl Aggregator {
    /// Create an aggregator with no prefix and default reservoir capacity.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring an aggregator.
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::default()
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MeasurementStore> Aggregator<S> {
    /// Create an aggregator with default settings backed by `store`.
    pub fn with_store(store: S) -> Self {
        AggregatorBuilder::default().build_with_store(store)
    }

    fn cache(&self) -> MutexGuard<'_, Cache<S>> {
        self.cache.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("aggregation cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record `value` for `name`.
    pub fn measure(&self, name: &str, value: impl Into<f64>) {
        self.record(name, value.into(), &MeasureOptions::default());
    }

    /// Record `value` for `name`, tagging it with a source and feeding percentile reservoirs as
    /// `options` asks.
    pub fn measure_with(&self, name: &str, value: impl Into<f64>, options: &MeasureOptions) {
        self.record(name, value.into(), options);
    }

    /// Record a value that may be missing.
    ///
    /// Fails with [`Error::MissingValue`] without touching any state when `value` is `None`.
    pub fn try_measure(
        &self,
        name: &str,
        value: Option<f64>,
        options: &MeasureOptions,
    ) -> Result<(), Error> {
        let value = value.ok_or_else(|| Error::MissingValue {
            name: name.to_owned(),
        })?;
        self.record(name, value, options);
        Ok(())
    }

    /// Same as [`measure`](Self::measure); reads better for durations in milliseconds.
    pub fn timing(&self, name: &str, value: impl Into<f64>) {
        self.measure(name, value);
    }

    /// Same as [`measure_with`](Self::measure_with).
    pub fn timing_with(&self, name: &str, value: impl Into<f64>, options: &MeasureOptions) {
        self.measure_with(name, value, options);
    }

    /// Run `f`, record how many whole milliseconds it took, and return its output.
    ///
    /// `f` runs without holding the aggregator's lock.
    pub fn time<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        self.time_with(name, &MeasureOptions::default(), f)
    }

    /// Like [`time`](Self::time), with a source and percentile tracking.
    pub fn time_with<T>(&self, name: &str, options: &MeasureOptions, f: impl FnOnce() -> T) -> T {
        let (output, elapsed) = self.time_source.measure(f);
        self.record(name, whole_millis(elapsed), options);
        output
    }

    fn record(&self, name: &str, value: f64, options: &MeasureOptions) {
        let record = MeasurementRecord {
            name: name.to_owned(),
            value,
            source: options.source.clone(),
        };

        let mut cache = self.cache();
        let Cache { store, percentiles } = &mut *cache;
        store.add(MeasureKind::Gauge, record);
        // one reservoir per (name, source) no matter how many percentiles were requested
        if options.tracks_percentiles() {
            percentiles
                .get_or_create(name, options.source.as_deref())
                .insert(value);
        }
    }

    /// Look up a buffered record, or a percentile.
    ///
    /// Returns `None` whenever nothing is buffered. With [`FetchOptions::percentile`] set, the
    /// percentile comes from the sourceless reservoir for `key` regardless of
    /// [`FetchOptions::source`], and is `None` if that reservoir does not exist. Otherwise the
    /// first buffered gauge named `key` whose source equals the requested one is returned.
    pub fn fetch(&self, key: &str, options: &FetchOptions) -> Option<Fetched> {
        let cache = self.cache();
        if cache.store.is_empty() {
            return None;
        }

        if let Some(p) = options.percentile {
            let store = cache.percentiles.get(key, None)?;
            return match store.percentile(p) {
                Ok(value) => Some(Fetched::Percentile(value)),
                Err(err) => {
                    tracing::debug!(metric = key, %err, "percentile unavailable");
                    None
                }
            };
        }

        cache
            .store
            .records(MeasureKind::Gauge)
            .iter()
            .find(|record| record.matches(key, options.source.as_deref()))
            .cloned()
            .map(Fetched::Measurement)
    }

    /// The first buffered sourceless record named `key`.
    pub fn get(&self, key: &str) -> Option<MeasurementRecord> {
        self.fetch(key, &FetchOptions::default())
            .and_then(Fetched::into_measurement)
    }

    /// Hand every buffered record to `queue`, returning how many were handed off.
    ///
    /// Does nothing, and does not call the queue, if nothing is buffered. Unless
    /// [`FlushOptions::preserve`] is set the buffer is cleared in the same critical section that
    /// snapshots it, so each record is delivered by exactly one flush. The queue merges the batch
    /// after the lock is released.
    pub fn flush_to<Q>(&self, queue: &mut Q, options: &FlushOptions) -> usize
    where
        Q: DeliveryQueue + ?Sized,
    {
        let batch = {
            let mut cache = self.cache();
            if cache.store.is_empty() {
                return 0;
            }
            if options.preserve {
                cache.store.queued()
            } else {
                cache.store.take()
            }
        };

        let delivered = batch.len();
        tracing::debug!(
            measurements = delivered,
            preserve = options.preserve,
            "handing batch to delivery queue"
        );
        queue.merge(batch);
        delivered
    }

    /// Drop every buffered record. Percentile reservoirs are kept.
    pub fn delete_all(&self) {
        self.cache().store.clear();
    }

    /// Whether no record is buffered.
    pub fn is_empty(&self) -> bool {
        self.cache().store.is_empty()
    }

    /// Prefix prepended to metric names on delivery.
    pub fn prefix(&self) -> Option<String> {
        self.cache().store.prefix().map(str::to_owned)
    }

    /// Replace the delivery prefix.
    pub fn set_prefix(&self, prefix: Option<String>) {
        self.cache().store.set_prefix(prefix);
    }

    /// Keys of every percentile reservoir created so far.
    pub fn tracked_percentiles(&self) -> Vec<PercentileKey> {
        self.cache().percentiles.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::Aggregator;
    use crate::options::MeasureOptions;

    #[test]
    fn requested_percentiles_insert_once() {
        let aggregator = Aggregator::new();
        let options = MeasureOptions::new().percentiles([50.0, 95.0, 99.0]);
        aggregator.measure_with("latency", 1, &options);
        aggregator.measure_with("latency", 2, &options);

        let cache = aggregator.cache();
        let_assert!(Some(store) = cache.percentiles.get("latency", None));
        check!(store.seen() == 2);
        check!(store.values() == [1.0, 2.0]);
    }

    #[test]
    fn untracked_metrics_create_no_reservoir() {
        let aggregator = Aggregator::new();
        aggregator.measure_with("latency", 1, &MeasureOptions::new().source("api"));
        check!(aggregator.cache().percentiles.is_empty());
    }
}
