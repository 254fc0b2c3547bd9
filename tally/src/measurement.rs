//! Measurement records and the store that buffers them until a flush

use std::mem;

/// Which family a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureKind {
    /// A point-in-time value.
    Gauge,
    /// A monotonically increasing count.
    Counter,
}

/// A single buffered measurement.
///
/// Lookups identify a record by `(name, source)`. A record without a source is distinct from one
/// whose source is the empty string.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// Metric name, without any configured prefix.
    pub name: String,
    /// Observed value.
    pub value: f64,
    /// Optional source tag, already stringified.
    pub source: Option<String>,
}

impl MeasurementRecord {
    /// Create a record without a source.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            source: None,
        }
    }

    /// Attach a source tag.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Whether this record answers a lookup for `name` with the given source.
    ///
    /// No requested source only matches sourceless records.
    pub fn matches(&self, name: &str, source: Option<&str>) -> bool {
        self.name == name && self.source.as_deref() == source
    }
}

/// A batch of measurements handed to a [`DeliveryQueue`](crate::DeliveryQueue).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Queued {
    /// Gauge measurements, in insertion order.
    pub gauges: Vec<MeasurementRecord>,
    /// Counter measurements, in insertion order.
    pub counters: Vec<MeasurementRecord>,
}

impl Queued {
    /// Whether the batch holds no measurement of any kind.
    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty() && self.counters.is_empty()
    }

    /// Total number of measurements in the batch.
    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    /// Records of one kind.
    pub fn of_kind(&self, kind: MeasureKind) -> &[MeasurementRecord] {
        match kind {
            MeasureKind::Gauge => &self.gauges,
            MeasureKind::Counter => &self.counters,
        }
    }

    /// Append every record of `other` to this batch. Nothing is deduplicated.
    pub fn merge(&mut self, other: Queued) {
        self.gauges.extend(other.gauges);
        self.counters.extend(other.counters);
    }
}

/// Storage for measurements that have not been flushed yet.
///
/// [`Aggregator`](crate::Aggregator) serializes every call behind its own lock, so
/// implementations need no internal synchronization.
pub trait MeasurementStore {
    /// Buffer a record.
    fn add(&mut self, kind: MeasureKind, record: MeasurementRecord);

    /// Drop every buffered record.
    fn clear(&mut self);

    /// Whether nothing is buffered.
    fn is_empty(&self) -> bool;

    /// Buffered records of one kind, with their unprefixed names.
    fn records(&self, kind: MeasureKind) -> &[MeasurementRecord];

    /// Copy of the buffered records ready for delivery, names carrying the prefix.
    fn queued(&self) -> Queued;

    /// Snapshot the buffered records and clear the store.
    fn take(&mut self) -> Queued {
        let queued = self.queued();
        self.clear();
        queued
    }

    /// Prefix prepended to metric names on delivery.
    fn prefix(&self) -> Option<&str>;

    /// Replace the delivery prefix.
    fn set_prefix(&mut self, prefix: Option<String>);
}

/// Default [`MeasurementStore`]: append-only buffers per [`MeasureKind`].
#[derive(Debug, Clone, Default)]
pub struct MeasurementQueue {
    pending: Queued,
    prefix: Option<String>,
}

impl MeasurementQueue {
    /// Create an empty store that prepends `prefix` to names on delivery.
    pub fn new(prefix: Option<String>) -> Self {
        let mut queue = Self::default();
        queue.set_prefix(prefix);
        queue
    }

    fn prefixed(&self, records: &[MeasurementRecord]) -> Vec<MeasurementRecord> {
        match &self.prefix {
            None => records.to_vec(),
            Some(prefix) => records
                .iter()
                .map(|record| MeasurementRecord {
                    name: format!("{prefix}.{}", record.name),
                    ..record.clone()
                })
                .collect(),
        }
    }
}

impl MeasurementStore for MeasurementQueue {
    fn add(&mut self, kind: MeasureKind, record: MeasurementRecord) {
        match kind {
            MeasureKind::Gauge => self.pending.gauges.push(record),
            MeasureKind::Counter => self.pending.counters.push(record),
        }
    }

    fn clear(&mut self) {
        self.pending = Queued::default();
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn records(&self, kind: MeasureKind) -> &[MeasurementRecord] {
        self.pending.of_kind(kind)
    }

    fn queued(&self) -> Queued {
        Queued {
            gauges: self.prefixed(&self.pending.gauges),
            counters: self.prefixed(&self.pending.counters),
        }
    }

    fn take(&mut self) -> Queued {
        if self.prefix.is_none() {
            return mem::take(&mut self.pending);
        }
        let queued = self.queued();
        self.clear();
        queued
    }

    fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn set_prefix(&mut self, prefix: Option<String>) {
        self.prefix = prefix.filter(|prefix| !prefix.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::{MeasureKind, MeasurementQueue, MeasurementRecord, MeasurementStore};

    #[test]
    fn prefix_applies_on_delivery_only() {
        let mut queue = MeasurementQueue::new(Some("app".into()));
        queue.add(MeasureKind::Gauge, MeasurementRecord::new("latency", 3.0));
        queue.add(MeasureKind::Counter, MeasurementRecord::new("hits", 1.0));

        check!(queue.records(MeasureKind::Gauge)[0].name == "latency");
        let queued = queue.take();
        check!(queued.gauges[0].name == "app.latency");
        check!(queued.counters[0].name == "app.hits");
        check!(queue.is_empty());
    }

    #[test]
    fn empty_prefix_is_no_prefix() {
        let mut queue = MeasurementQueue::new(Some(String::new()));
        check!(queue.prefix() == None);
        queue.add(MeasureKind::Gauge, MeasurementRecord::new("latency", 3.0));
        check!(queue.take().gauges[0].name == "latency");
    }

    #[test]
    fn take_without_prefix_moves_records() {
        let mut queue = MeasurementQueue::default();
        queue.add(MeasureKind::Gauge, MeasurementRecord::new("a", 1.0).with_source("x"));
        let queued = queue.take();
        check!(queued.len() == 1);
        check!(queued.gauges[0].matches("a", Some("x")));
        check!(!queued.gauges[0].matches("a", None));
        check!(queue.is_empty());
    }
}
