//! Background thread that periodically flushes an aggregator

use std::{
    io,
    sync::{
        Arc,
        mpsc::{Receiver, RecvTimeoutError, Sender, channel},
    },
    thread,
    time::{Duration, Instant},
};

use crate::aggregator::Aggregator;
use crate::measurement::MeasurementStore;
use crate::options::FlushOptions;
use crate::queue::DeliveryQueue;

enum Message {
    Flush(Sender<()>),
    Shutdown,
}

/// Calls [`Aggregator::flush_to`] on a dedicated thread every `interval`.
///
/// The thread owns the queue. [`shutdown`](Self::shutdown) performs a final flush and hands the
/// queue back; dropping the flusher also performs the final flush.
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tally::{Aggregator, Flusher, FlushOptions, Queued};
///
/// let aggregator = Arc::new(Aggregator::new());
/// let flusher = Flusher::spawn(
///     aggregator.clone(),
///     Queued::default(),
///     Duration::from_secs(60),
///     FlushOptions::new(),
/// )
/// .unwrap();
///
/// aggregator.measure("jobs.processed", 3);
/// let queue = flusher.shutdown();
/// assert_eq!(queue.gauges.len(), 1);
/// ```
pub struct Flusher<Q> {
    sender: Sender<Message>,
    handle: Option<thread::JoinHandle<Q>>,
}

impl<Q> Flusher<Q>
where
    Q: DeliveryQueue + Send + 'static,
{
    /// Start flushing `aggregator` into `queue`.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn spawn<S>(
        aggregator: Arc<Aggregator<S>>,
        queue: Q,
        interval: Duration,
        options: FlushOptions,
    ) -> io::Result<Self>
    where
        S: MeasurementStore + Send + 'static,
    {
        assert!(interval > Duration::ZERO);
        let (sender, receiver) = channel();
        let handle = thread::Builder::new()
            .name("tally-flusher".into())
            .spawn(move || run(aggregator, queue, receiver, interval, options))?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Flush right away and wait for the queue to have merged the batch.
    ///
    /// Returns `false` if the flusher thread is gone.
    pub fn flush_now(&self) -> bool {
        let (tx, rx) = channel();
        if self.sender.send(Message::Flush(tx)).is_err() {
            return false;
        }
        rx.recv().is_ok()
    }

    /// Stop the thread after a final flush and return the queue.
    ///
    /// If the flusher thread panicked, the panic is resumed on the caller's thread.
    pub fn shutdown(mut self) -> Q {
        let handle = self
            .handle
            .take()
            .expect("unreachable: handle is only taken on shutdown or drop");
        let _ = self.sender.send(Message::Shutdown);
        match handle.join() {
            Ok(queue) => queue,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl<Q> Drop for Flusher<Q> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.sender.send(Message::Shutdown);
            if handle.join().is_err() {
                tracing::error!("metrics flusher thread panicked");
            }
        }
    }
}

fn run<S, Q>(
    aggregator: Arc<Aggregator<S>>,
    mut queue: Q,
    receiver: Receiver<Message>,
    interval: Duration,
    options: FlushOptions,
) -> Q
where
    S: MeasurementStore,
    Q: DeliveryQueue,
{
    tracing::debug!(?interval, "metrics flusher started");
    let mut next_flush = Instant::now() + interval;
    loop {
        let timeout = next_flush.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(timeout) {
            Ok(Message::Flush(done)) => {
                aggregator.flush_to(&mut queue, &options);
                let _ = done.send(());
            }
            Err(RecvTimeoutError::Timeout) => {
                aggregator.flush_to(&mut queue, &options);
                next_flush += interval;
                // skip ticks missed while a slow queue merged
                let now = Instant::now();
                if next_flush < now {
                    next_flush = now + interval;
                }
            }
            Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let delivered = aggregator.flush_to(&mut queue, &options);
    tracing::debug!(delivered, "metrics flusher shut down after final flush");
    queue
}
