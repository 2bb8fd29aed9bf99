//! Batch processor: ingestion pump plus worker pool.
//!
//! # Responsibilities
//! - Own the bounded ingestion channel
//! - Forward ingested items into the batch queue by key (pump)
//! - Run N workers that take batches and call the handler
//!
//! # Design Decisions
//! - `done` is issued by a guard, so errors and panics cannot strand a key
//! - Handler failures are logged and counted; the worker keeps going
//! - Shutdown stops new pulls; a running handler is never interrupted

use std::any::Any;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::batch::queue::BatchQueue;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Synchronous handler invoked once per batch.
pub trait BatchHandler<T>: Send + Sync + 'static {
    type Error: Display;

    fn handle(&self, key: &str, items: Vec<T>) -> Result<(), Self::Error>;
}

/// Maps an item to its batching key.
pub type KeyFn<T> = fn(&T) -> String;

/// Errors returned by [`BatchProcessor::run`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    /// The ingestion receiver was consumed by an earlier run.
    #[error("batch processor is already running or has run")]
    AlreadyRunning,

    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// Releases the in-flight key when the worker is done with it.
struct InFlight<'a, T: Send + 'static, Q: BatchQueue<T>> {
    queue: &'a Q,
    key: String,
    _item: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + 'static, Q: BatchQueue<T>> Drop for InFlight<'_, T, Q> {
    fn drop(&mut self) {
        self.queue.done(&self.key);
    }
}

/// Pump and worker pool around a [`BatchQueue`].
pub struct BatchProcessor<T, Q, H> {
    queue: Arc<Q>,
    handler: Arc<H>,
    key_fn: KeyFn<T>,
    collect_tx: mpsc::Sender<T>,
    collect_rx: Mutex<Option<mpsc::Receiver<T>>>,
}

impl<T, Q, H> BatchProcessor<T, Q, H>
where
    T: Send + 'static,
    Q: BatchQueue<T>,
    H: BatchHandler<T>,
{
    /// Create a processor whose ingestion channel holds `capacity` items.
    pub fn new(queue: Arc<Q>, handler: Arc<H>, key_fn: KeyFn<T>, capacity: usize) -> Self {
        let (collect_tx, collect_rx) = mpsc::channel(capacity.max(1));
        Self {
            queue,
            handler,
            key_fn,
            collect_tx,
            collect_rx: Mutex::new(Some(collect_rx)),
        }
    }

    /// Write side of the ingestion channel. Sends wait while it is full.
    pub fn collector(&self) -> mpsc::Sender<T> {
        self.collect_tx.clone()
    }

    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Start the pump and `workers` workers, then wait for `shutdown`.
    ///
    /// Returns once every task has stopped. In-flight batches finish first.
    pub async fn run(&self, mut shutdown: ShutdownSignal, workers: usize) -> Result<(), BatchError> {
        if workers == 0 {
            return Err(BatchError::NoWorkers);
        }
        let rx = self
            .collect_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(BatchError::AlreadyRunning)?;

        tracing::info!(workers, "Batch processor starting");

        let mut tasks = JoinSet::new();
        tasks.spawn(pump(rx, self.queue.clone(), self.key_fn, shutdown.clone()));
        for id in 0..workers {
            tasks.spawn(worker(
                id,
                self.queue.clone(),
                self.handler.clone(),
                shutdown.clone(),
            ));
        }

        shutdown.cancelled().await;
        tracing::info!("Batch processor received shutdown signal, draining");
        self.queue.shut_down();

        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                tracing::error!(error = %e, "Batch processor task ended abnormally");
            }
        }

        tracing::info!("Batch processor stopped");
        Ok(())
    }
}

async fn pump<T, Q>(
    mut rx: mpsc::Receiver<T>,
    queue: Arc<Q>,
    key_fn: KeyFn<T>,
    mut shutdown: ShutdownSignal,
) where
    T: Send + 'static,
    Q: BatchQueue<T>,
{
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            item = rx.recv() => match item {
                Some(item) => queue.add(key_fn(&item), item),
                None => {
                    tracing::debug!("Ingestion channel closed");
                    break;
                }
            },
        }
    }
    tracing::debug!("Pump stopped");
}

async fn worker<T, Q, H>(id: usize, queue: Arc<Q>, handler: Arc<H>, mut shutdown: ShutdownSignal)
where
    T: Send + 'static,
    Q: BatchQueue<T>,
    H: BatchHandler<T>,
{
    tracing::debug!(worker = id, "Worker started");
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            next = queue.get() => next,
        };
        let Some((key, items)) = next else { break };
        process_one(id, &*queue, &*handler, key, items);
    }
    tracing::debug!(worker = id, "Worker stopped");
}

fn process_one<T, Q, H>(id: usize, queue: &Q, handler: &H, key: String, items: Vec<T>)
where
    T: Send + 'static,
    Q: BatchQueue<T>,
    H: BatchHandler<T>,
{
    let guard = InFlight {
        queue,
        key,
        _item: std::marker::PhantomData,
    };
    let key = guard.key.as_str();
    let size = items.len();
    let started = Instant::now();

    match catch_unwind(AssertUnwindSafe(|| handler.handle(key, items))) {
        Ok(Ok(())) => {
            metrics::record_batch(size, started);
            tracing::trace!(worker = id, key = %key, size, "Batch processed");
        }
        Ok(Err(e)) => {
            metrics::record_batch_failure("error");
            tracing::error!(worker = id, key = %key, size, error = %e, "Batch handler failed, batch dropped");
        }
        Err(panic) => {
            metrics::record_batch_failure("panic");
            tracing::error!(
                worker = id,
                key = %key,
                size,
                panic = %panic_message(&*panic),
                "Batch handler panicked, batch dropped"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::queue::KeyedBatchQueue;
    use crate::lifecycle::Shutdown;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Recording {
        batches: Mutex<Vec<(String, Vec<u32>)>>,
        calls: AtomicUsize,
    }

    impl BatchHandler<(String, u32)> for Recording {
        type Error = String;

        fn handle(&self, key: &str, items: Vec<(String, u32)>) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if items.iter().any(|(_, v)| *v == 666) {
                panic!("poisoned item");
            }
            if items.iter().any(|(_, v)| *v == 13) {
                return Err("unlucky".to_string());
            }
            self.batches
                .lock()
                .unwrap()
                .push((key.to_string(), items.into_iter().map(|(_, v)| v).collect()));
            Ok(())
        }
    }

    fn by_key(item: &(String, u32)) -> String {
        item.0.clone()
    }

    async fn wait_for_calls(handler: &Recording, calls: usize) {
        for _ in 0..200 {
            if handler.calls.load(Ordering::SeqCst) >= calls {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("handler was not called {} times", calls);
    }

    #[tokio::test]
    async fn test_items_reach_handler_in_order() {
        let queue = Arc::new(KeyedBatchQueue::new());
        let handler = Arc::new(Recording::default());
        let processor = Arc::new(BatchProcessor::new(queue, handler.clone(), by_key, 16));
        let shutdown = Shutdown::new();

        let tx = processor.collector();
        let p = processor.clone();
        let signal = shutdown.subscribe();
        let running = tokio::spawn(async move { p.run(signal, 2).await });

        for v in 1..=5 {
            tx.send(("a".to_string(), v)).await.unwrap();
        }
        for _ in 0..200 {
            let seen: usize = handler.batches.lock().unwrap().iter().map(|(_, v)| v.len()).sum();
            if seen == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        shutdown.trigger();
        running.await.unwrap().unwrap();

        let batches = handler.batches.lock().unwrap();
        let seen: Vec<u32> = batches.iter().flat_map(|(_, v)| v.clone()).collect();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert!(batches.iter().all(|(k, _)| k == "a"));
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_worker() {
        let queue = Arc::new(KeyedBatchQueue::new());
        let handler = Arc::new(Recording::default());
        let processor = Arc::new(BatchProcessor::new(
            queue.clone(),
            handler.clone(),
            by_key,
            16,
        ));
        let shutdown = Shutdown::new();

        let tx = processor.collector();
        let p = processor.clone();
        let signal = shutdown.subscribe();
        let running = tokio::spawn(async move { p.run(signal, 1).await });

        tx.send(("a".to_string(), 666)).await.unwrap();
        wait_for_calls(&handler, 1).await;
        tx.send(("a".to_string(), 13)).await.unwrap();
        wait_for_calls(&handler, 2).await;
        tx.send(("a".to_string(), 7)).await.unwrap();
        wait_for_calls(&handler, 3).await;

        // The key was released after the panic and the error.
        assert_eq!(queue.in_flight_len(), 0);

        shutdown.trigger();
        running.await.unwrap().unwrap();

        let batches = handler.batches.lock().unwrap();
        assert_eq!(batches.as_slice(), &[("a".to_string(), vec![7])]);
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let queue = Arc::new(KeyedBatchQueue::new());
        let handler = Arc::new(Recording::default());
        let processor = BatchProcessor::new(queue, handler, by_key, 4);
        let shutdown = Shutdown::new();
        shutdown.trigger();

        assert_eq!(processor.run(shutdown.subscribe(), 1).await, Ok(()));
        assert_eq!(
            processor.run(shutdown.subscribe(), 1).await,
            Err(BatchError::AlreadyRunning)
        );
    }

    #[tokio::test]
    async fn test_full_channel_suspends_producer() {
        let queue = Arc::new(KeyedBatchQueue::new());
        let handler = Arc::new(Recording::default());
        let processor = BatchProcessor::new(queue.clone(), handler, by_key, 1);
        let tx = processor.collector();

        tx.send(("a".to_string(), 1)).await.unwrap();
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            tx.send(("a".to_string(), 2)),
        )
        .await;
        assert!(blocked.is_err(), "send on a full channel should wait");

        // Nothing drains the channel until run() starts.
        assert_eq!(queue.ready_len(), 0);
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let queue = Arc::new(KeyedBatchQueue::new());
        let handler = Arc::new(Recording::default());
        let processor = BatchProcessor::new(queue, handler, by_key, 4);
        let shutdown = Shutdown::new();

        assert_eq!(
            processor.run(shutdown.subscribe(), 0).await,
            Err(BatchError::NoWorkers)
        );
    }
}
