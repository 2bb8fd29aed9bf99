//! Failure injection tests for the failure detector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use failure_detector::config::DetectorConfig;
use failure_detector::health::{
    EndpointState, EndpointStatus, FailureDetector, Outcome, StatusEvaluator, WeightedEvaluator,
};
use url::Url;

mod common;

/// Panics the first time it judges the poisoned endpoint.
#[derive(Debug, Default)]
struct PoisonedEvaluator {
    inner: WeightedEvaluator,
    tripped: Arc<AtomicBool>,
}

impl StatusEvaluator for PoisonedEvaluator {
    fn window(&self) -> usize {
        self.inner.window()
    }

    fn evaluate(&self, endpoint: &mut EndpointState) -> bool {
        if endpoint.key() == "poison:1" && !self.tripped.swap(true, Ordering::SeqCst) {
            panic!("evaluator blew up on {}", endpoint.key());
        }
        self.inner.evaluate(endpoint)
    }
}

#[tokio::test]
async fn test_handler_panic_is_contained() {
    let evaluator = PoisonedEvaluator::default();
    let tripped = evaluator.tripped.clone();
    let builder = FailureDetector::builder(DetectorConfig::default()).evaluator(Arc::new(evaluator));
    let mut harness = common::start_with(builder, 1);
    let tx = harness.detector.collector();

    // The only worker panics on the first batch.
    common::send_all(&tx, common::samples("ns1", "etcd", "poison:1", Outcome::Failure, 10)).await;
    let panicked = common::wait_until(Duration::from_secs(5), || {
        let tripped = tripped.clone();
        async move { tripped.load(Ordering::SeqCst) }
    })
    .await;
    assert!(panicked);

    // The same worker, and the same service key, keep serving afterwards.
    common::send_all(&tx, common::samples("ns1", "etcd", "good:1", Outcome::Failure, 10)).await;
    let change = harness.next_change().await;
    assert_eq!(change.service, "ns1/etcd");
    assert_eq!(change.endpoint, "good:1");
    assert!((change.weight - 0.9).abs() < 1e-6);

    common::send_all(&tx, common::samples("ns2", "etcd", "good:1", Outcome::Failure, 10)).await;
    let change = harness.next_change().await;
    assert_eq!(change.service, "ns2/etcd");

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_collector() {
    let harness = common::start_detector(DetectorConfig::default(), 2);
    let tx = harness.detector.collector();
    let detector = harness.detector.clone();

    common::send_all(&tx, common::samples("ns1", "etcd", "a:1", Outcome::Success, 3)).await;
    let tracked = common::wait_until(Duration::from_secs(5), || {
        let detector = detector.clone();
        async move {
            let url = Url::parse("https://a:1").unwrap();
            detector.endpoint_status("ns1", "etcd", &url).is_some()
        }
    })
    .await;
    assert!(tracked);

    harness.stop().await.unwrap();

    // The pump is gone, so nothing can be ingested any more.
    let late = common::samples("ns1", "etcd", "a:1", Outcome::Failure, 1).remove(0);
    assert!(tx.send(late).await.is_err());
}

#[tokio::test]
async fn test_second_run_is_rejected() {
    let harness = common::start_detector(DetectorConfig::default(), 1);
    let detector = harness.detector.clone();
    harness.stop().await.unwrap();

    let shutdown = failure_detector::Shutdown::new();
    shutdown.trigger();
    assert!(detector.run(shutdown.subscribe(), 1).await.is_err());
}

#[tokio::test]
async fn test_quarantined_endpoint_is_forgotten_when_idle() {
    let mut config = DetectorConfig::default();
    // Sweep by hand only.
    config.store.eviction_interval_secs = 3600;
    let mut harness = common::start_detector(config, 2);
    let tx = harness.detector.collector();

    for _ in 0..10 {
        common::send_all(&tx, common::samples("ns1", "etcd", "dead:1", Outcome::Failure, 10)).await;
        harness.next_change().await;
    }
    let url = Url::parse("https://dead:1").unwrap();
    let health = harness.detector.endpoint_status("ns1", "etcd", &url).unwrap();
    assert_eq!(health.status, EndpointStatus::Quarantined);

    // Idle past the endpoint TTL: the verdict goes away with the history.
    harness.clock.advance(Duration::from_secs(61));
    assert!(harness.detector.endpoint_status("ns1", "etcd", &url).is_none());

    let evicted = harness.detector.tracker().evict_expired();
    assert_eq!(evicted.endpoints, 1);

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_janitor_sweeps_idle_endpoints() {
    let mut config = DetectorConfig::default();
    config.store.eviction_interval_secs = 1;
    let harness = common::start_detector(config, 1);
    let tx = harness.detector.collector();
    let detector = harness.detector.clone();

    common::send_all(&tx, common::samples("ns1", "etcd", "idle:1", Outcome::Success, 3)).await;
    let stored = |detector: Arc<failure_detector::FailureDetector>| {
        detector
            .tracker()
            .store()
            .service("ns1/etcd")
            .map(|service| service.len())
    };
    let tracked = common::wait_until(Duration::from_secs(5), || {
        let detector = detector.clone();
        async move { stored(detector) == Some(1) }
    })
    .await;
    assert!(tracked);

    // Past the endpoint TTL but not the service TTL.
    harness.clock.advance(Duration::from_secs(61));
    let swept = common::wait_until(Duration::from_secs(5), || {
        let detector = detector.clone();
        async move { stored(detector) == Some(0) }
    })
    .await;
    assert!(swept, "janitor did not remove the idle endpoint");

    harness.stop().await.unwrap();
}
