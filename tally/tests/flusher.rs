use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use assert2::check;
use tally::{Aggregator, FlushOptions, Flusher, Queued};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn delivered(queue: &Arc<Mutex<Vec<Queued>>>) -> usize {
    queue.lock().unwrap().iter().map(Queued::len).sum()
}

#[test]
fn flushes_periodically() {
    init_logging();
    let aggregator = Arc::new(Aggregator::new());
    let queue = Arc::new(Mutex::new(Vec::<Queued>::new()));
    let flusher = Flusher::spawn(
        aggregator.clone(),
        queue.clone(),
        Duration::from_millis(10),
        FlushOptions::new(),
    )
    .unwrap();

    aggregator.measure("ticks", 1);
    let deadline = Instant::now() + Duration::from_secs(5);
    while delivered(&queue) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    check!(delivered(&queue) == 1);
    check!(aggregator.is_empty());

    drop(flusher);
}

#[test]
fn flush_now_waits_for_delivery() {
    init_logging();
    let aggregator = Arc::new(Aggregator::new());
    let queue = Arc::new(Mutex::new(Vec::<Queued>::new()));
    let flusher = Flusher::spawn(
        aggregator.clone(),
        queue.clone(),
        Duration::from_secs(3600),
        FlushOptions::new(),
    )
    .unwrap();

    aggregator.measure("a", 1);
    aggregator.measure("b", 2);
    check!(flusher.flush_now());
    check!(delivered(&queue) == 2);

    // empty flushes never reach the queue
    check!(flusher.flush_now());
    check!(queue.lock().unwrap().len() == 1);
}

#[test]
fn shutdown_flushes_and_returns_queue() {
    init_logging();
    let aggregator = Arc::new(Aggregator::new());
    let flusher = Flusher::spawn(
        aggregator.clone(),
        Queued::default(),
        Duration::from_secs(3600),
        FlushOptions::new(),
    )
    .unwrap();

    aggregator.measure("late", 7);
    let queue = flusher.shutdown();
    check!(queue.gauges.len() == 1);
    check!(queue.gauges[0].value == 7.0);
    check!(aggregator.is_empty());
}

#[test]
fn drop_flushes() {
    init_logging();
    let aggregator = Arc::new(Aggregator::new());
    let queue = Arc::new(Mutex::new(Queued::default()));
    let flusher = Flusher::spawn(
        aggregator.clone(),
        queue.clone(),
        Duration::from_secs(3600),
        FlushOptions::new(),
    )
    .unwrap();

    aggregator.measure("late", 7);
    drop(flusher);
    check!(queue.lock().unwrap().gauges.len() == 1);
}

#[test]
fn preserving_flusher_keeps_records() {
    init_logging();
    let aggregator = Arc::new(Aggregator::new());
    let flusher = Flusher::spawn(
        aggregator.clone(),
        Vec::<Queued>::new(),
        Duration::from_secs(3600),
        FlushOptions::preserve(),
    )
    .unwrap();

    aggregator.measure("kept", 1);
    check!(flusher.flush_now());
    let batches = flusher.shutdown();
    // the explicit flush and the final one both see the record
    check!(batches.len() == 2);
    check!(aggregator.get("kept").is_some());
}
