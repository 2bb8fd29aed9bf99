//! Passive health checking (failure detection).
//!
//! # Responsibilities
//! - Expose the ingestion channel for request outcomes
//! - Batch samples by service and score them on a worker pool
//! - Sweep idle services and endpoints in the background
//! - Answer "how healthy is this endpoint" for the routing layer
//!
//! # Design Decisions
//! - Never probes; only what callers report is scored
//! - One in-flight batch per service, so services score in parallel
//!   while each service's endpoints are mutated sequentially
//! - State lives in memory only and expires when idle

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use crate::batch::processor::BatchProcessor;
use crate::batch::queue::{BatchQueue, KeyedBatchQueue};
use crate::config::DetectorConfig;
use crate::health::evaluator::{StatusEvaluator, WeightedEvaluator};
use crate::health::notify::{LogSink, StatusSink};
use crate::health::sample::EndpointSample;
use crate::health::tracker::{
    BatchReport, DetectorResult, EndpointHealth, HealthTracker, ServiceHealth,
};
use crate::lifecycle::ShutdownSignal;
use crate::store::{Clock, SystemClock};

fn batch_key(sample: &EndpointSample) -> String {
    sample.service_key()
}

/// Builder for [`FailureDetector`], for swapping the clock, sink or policy.
pub struct FailureDetectorBuilder {
    config: DetectorConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn StatusSink>,
    evaluator: Option<Arc<dyn StatusEvaluator>>,
}

impl FailureDetectorBuilder {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            sink: Arc::new(LogSink),
            evaluator: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the default [`WeightedEvaluator`].
    pub fn evaluator(mut self, evaluator: Arc<dyn StatusEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Build with the in-process [`KeyedBatchQueue`].
    pub fn build(self) -> FailureDetector {
        self.build_with_queue(Arc::new(KeyedBatchQueue::new()))
    }

    /// Build on a caller-supplied queue.
    pub fn build_with_queue<Q>(self, queue: Arc<Q>) -> FailureDetector<Q>
    where
        Q: BatchQueue<EndpointSample>,
    {
        let evaluator = self.evaluator.unwrap_or_else(|| {
            Arc::new(WeightedEvaluator::new(
                self.config.evaluator.window,
                self.config.evaluator.step_percent,
            ))
        });
        let tracker = Arc::new(HealthTracker::new(
            &self.config,
            self.clock,
            evaluator,
            self.sink,
        ));
        let processor = BatchProcessor::new(
            queue,
            tracker.clone(),
            batch_key,
            self.config.ingestion.channel_capacity,
        );

        FailureDetector {
            tracker,
            processor,
            eviction_interval: self.config.store.eviction_interval(),
        }
    }
}

/// Passive failure detector for endpoints grouped by service.
pub struct FailureDetector<Q = KeyedBatchQueue<EndpointSample>> {
    tracker: Arc<HealthTracker>,
    processor: BatchProcessor<EndpointSample, Q, HealthTracker>,
    eviction_interval: Duration,
}

impl FailureDetector {
    /// Detector with the system clock, a logging sink and the weighted policy.
    pub fn new(config: DetectorConfig) -> Self {
        FailureDetectorBuilder::new(config).build()
    }

    pub fn builder(config: DetectorConfig) -> FailureDetectorBuilder {
        FailureDetectorBuilder::new(config)
    }
}

impl<Q: BatchQueue<EndpointSample>> FailureDetector<Q> {
    /// Write-only ingestion channel. Sends wait while it is full.
    pub fn collector(&self) -> mpsc::Sender<EndpointSample> {
        self.processor.collector()
    }

    /// Run the pump, `workers` workers and the janitor until `shutdown`.
    pub async fn run(&self, shutdown: ShutdownSignal, workers: usize) -> DetectorResult<()> {
        let janitor = tokio::spawn(janitor(
            self.tracker.clone(),
            self.eviction_interval,
            shutdown.clone(),
        ));

        let result = self.processor.run(shutdown, workers).await;

        janitor.abort();
        let _ = janitor.await;
        result.map_err(Into::into)
    }

    /// Handle one batch directly, bypassing the queue.
    pub fn process_batch(
        &self,
        service_key: &str,
        samples: Vec<EndpointSample>,
    ) -> DetectorResult<BatchReport> {
        self.tracker.process_batch(service_key, samples)
    }

    /// Health of the endpoint behind `url`, if it is being tracked.
    pub fn endpoint_status(&self, namespace: &str, service: &str, url: &Url) -> Option<EndpointHealth> {
        self.tracker.endpoint_status(namespace, service, url)
    }

    /// Every tracked service and endpoint.
    pub fn snapshot(&self) -> Vec<ServiceHealth> {
        self.tracker.snapshot()
    }

    pub fn tracker(&self) -> &Arc<HealthTracker> {
        &self.tracker
    }
}

async fn janitor(tracker: Arc<HealthTracker>, every: Duration, mut shutdown: ShutdownSignal) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracker.evict_expired();
            }
            _ = shutdown.cancelled() => {
                tracing::debug!("Janitor received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
