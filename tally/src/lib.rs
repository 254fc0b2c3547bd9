#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod aggregator;
mod error;
pub mod flusher;
pub mod measurement;
pub mod options;
pub mod percentile;
pub mod queue;
pub mod time;

pub use aggregator::{Aggregator, AggregatorBuilder, DEFAULT_RESERVOIR_CAPACITY};
pub use error::Error;
pub use flusher::Flusher;
pub use measurement::{MeasureKind, MeasurementQueue, MeasurementRecord, MeasurementStore, Queued};
pub use options::{FetchOptions, Fetched, FlushOptions, MeasureOptions};
pub use percentile::{PercentileKey, PercentileRegistry};
pub use queue::DeliveryQueue;
pub use time::{Clock, TimeSource};

pub use tally_reservoir as reservoir;
