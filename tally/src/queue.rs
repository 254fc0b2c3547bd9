//! Destinations for flushed batches

use std::sync::{Arc, Mutex, PoisonError};

use crate::measurement::Queued;

/// Receives batches handed off by [`Aggregator::flush_to`](crate::Aggregator::flush_to).
///
/// `merge` must keep everything already queued and add the new batch to it. Delivery downstream
/// is at-least-once, so implementations need not deduplicate.
pub trait DeliveryQueue {
    /// Add `batch` to the queue.
    fn merge(&mut self, batch: Queued);
}

impl DeliveryQueue for Queued {
    fn merge(&mut self, batch: Queued) {
        Queued::merge(self, batch);
    }
}

/// Keeps every delivered batch separately, in delivery order.
impl DeliveryQueue for Vec<Queued> {
    fn merge(&mut self, batch: Queued) {
        self.push(batch);
    }
}

impl<Q: DeliveryQueue + ?Sized> DeliveryQueue for &mut Q {
    fn merge(&mut self, batch: Queued) {
        (**self).merge(batch);
    }
}

impl<Q: DeliveryQueue + ?Sized> DeliveryQueue for Box<Q> {
    fn merge(&mut self, batch: Queued) {
        (**self).merge(batch);
    }
}

/// Shared queue, e.g. one handed to a [`Flusher`](crate::Flusher) and inspected elsewhere.
impl<Q: DeliveryQueue + ?Sized> DeliveryQueue for Arc<Mutex<Q>> {
    fn merge(&mut self, batch: Queued) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(batch);
    }
}
