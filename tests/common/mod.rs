//! Shared utilities for integration and load testing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use failure_detector::config::DetectorConfig;
use failure_detector::health::{
    ChannelSink, DetectorResult, EndpointChange, EndpointSample, FailureDetector,
    FailureDetectorBuilder, Outcome,
};
use failure_detector::lifecycle::Shutdown;
use failure_detector::store::ManualClock;

/// A detector running on a manual clock, with its change stream.
pub struct Harness {
    pub detector: Arc<FailureDetector>,
    pub clock: Arc<ManualClock>,
    pub changes: mpsc::UnboundedReceiver<EndpointChange>,
    pub shutdown: Shutdown,
    pub running: JoinHandle<DetectorResult<()>>,
}

impl Harness {
    /// Stop the detector and wait for it to drain.
    pub async fn stop(self) -> DetectorResult<()> {
        self.shutdown.trigger();
        self.running.await.expect("detector task panicked")
    }

    /// Next published change, failing the test after a few seconds.
    pub async fn next_change(&mut self) -> EndpointChange {
        tokio::time::timeout(Duration::from_secs(5), self.changes.recv())
            .await
            .expect("timed out waiting for a change")
            .expect("change stream closed")
    }
}

/// Start a detector with `workers` workers.
#[allow(dead_code)]
pub fn start_detector(config: DetectorConfig, workers: usize) -> Harness {
    start_with(FailureDetector::builder(config), workers)
}

/// Start a detector from a partially configured builder.
pub fn start_with(builder: FailureDetectorBuilder, workers: usize) -> Harness {
    let clock = Arc::new(ManualClock::new());
    let (sink, changes) = ChannelSink::new();
    let detector = Arc::new(builder.clock(clock.clone()).sink(Arc::new(sink)).build());

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let d = detector.clone();
    let running = tokio::spawn(async move { d.run(signal, workers).await });

    Harness {
        detector,
        clock,
        changes,
        shutdown,
        running,
    }
}

/// `n` samples for one endpoint of one service.
pub fn samples(namespace: &str, service: &str, host: &str, outcome: Outcome, n: usize) -> Vec<EndpointSample> {
    let url = Url::parse(&format!("https://{}", host)).unwrap();
    (0..n)
        .map(|_| EndpointSample::new(namespace, service, Some(url.clone()), outcome))
        .collect()
}

/// Push samples through the ingestion channel.
pub async fn send_all(tx: &mpsc::Sender<EndpointSample>, samples: Vec<EndpointSample>) {
    for sample in samples {
        tx.send(sample).await.expect("collector closed");
    }
}

/// Poll `check` until it holds or the timeout elapses.
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
