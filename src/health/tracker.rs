//! Batch handler that scores endpoints.
//!
//! # Responsibilities
//! - Fold a service's batch of samples into its endpoints
//! - Judge every touched endpoint once per batch
//! - Report and publish endpoints whose weight or status moved
//! - Answer health queries for the routing layer
//!
//! # Design Decisions
//! - Service and endpoint entries are created on first sight
//! - Only the batch holding a service key mutates that service
//! - Changes are published after the store is updated

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::batch::processor::{BatchError, BatchHandler};
use crate::config::DetectorConfig;
use crate::health::evaluator::StatusEvaluator;
use crate::health::notify::{EndpointChange, StatusSink};
use crate::health::sample::{self, EndpointSample};
use crate::health::state::{EndpointState, EndpointStatus};
use crate::observability::metrics;
use crate::store::{Clock, Evicted, NestedStore};

/// Errors raised by the failure detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// A batch carried samples for more than one service.
    #[error("batch for '{expected}' contains a sample for '{found}'")]
    MixedBatch { expected: String, found: String },

    /// The worker pool could not be started.
    #[error("batch processing error: {0}")]
    Batch(#[from] BatchError),
}

/// Result type for detector operations.
pub type DetectorResult<T> = Result<T, DetectorError>;

/// Outcome of handling one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub service: String,
    /// Samples folded into an endpoint.
    pub accepted: usize,
    /// Samples dropped for lack of an endpoint key.
    pub rejected: usize,
    /// Endpoints whose weight or status moved, ordered by endpoint key.
    pub changed: Vec<EndpointChange>,
}

impl BatchReport {
    fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            ..Self::default()
        }
    }

    /// Did the given endpoint change during this batch?
    pub fn has_changed(&self, endpoint: &str) -> bool {
        self.changed.iter().any(|c| c.endpoint == endpoint)
    }

    pub fn any_changed(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// Read-only view of one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointHealth {
    pub endpoint: String,
    pub weight: f32,
    pub status: EndpointStatus,
    /// Samples currently held in the window.
    pub samples: usize,
}

impl EndpointHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == EndpointStatus::Healthy
    }
}

impl From<&EndpointState> for EndpointHealth {
    fn from(state: &EndpointState) -> Self {
        Self {
            endpoint: state.key().to_string(),
            weight: state.weight(),
            status: state.status(),
            samples: state.window().len(),
        }
    }
}

/// Read-only view of one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub service: String,
    pub endpoints: Vec<EndpointHealth>,
}

/// Owns the nested store and scores endpoints batch by batch.
#[derive(Debug)]
pub struct HealthTracker {
    store: NestedStore,
    evaluator: Arc<dyn StatusEvaluator>,
    sink: Arc<dyn StatusSink>,
    window: usize,
    reject_missing_host: bool,
}

impl HealthTracker {
    pub fn new(
        config: &DetectorConfig,
        clock: Arc<dyn Clock>,
        evaluator: Arc<dyn StatusEvaluator>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            store: NestedStore::new(
                config.store.service_ttl(),
                config.store.endpoint_ttl(),
                clock,
            ),
            window: evaluator.window().max(1),
            evaluator,
            sink,
            reject_missing_host: config.ingestion.reject_missing_host,
        }
    }

    /// Fold one service's samples into its endpoints and judge them.
    pub fn process_batch(
        &self,
        service_key: &str,
        samples: Vec<EndpointSample>,
    ) -> DetectorResult<BatchReport> {
        let mut report = BatchReport::new(service_key);
        if samples.is_empty() {
            return Ok(report);
        }
        if let Some(stray) = samples.iter().find(|s| s.service_key() != service_key) {
            return Err(DetectorError::MixedBatch {
                expected: service_key.to_string(),
                found: stray.service_key(),
            });
        }

        let service = self.store.service_or_new(service_key);
        let mut touched: BTreeMap<String, EndpointState> = BTreeMap::new();

        for sample in &samples {
            let endpoint_key = match sample.endpoint_key() {
                Some(key) => key,
                None if self.reject_missing_host => {
                    report.rejected += 1;
                    metrics::record_rejected_sample();
                    tracing::debug!(service = %service_key, "Sample without endpoint host rejected");
                    continue;
                }
                None => String::new(),
            };

            metrics::record_sample(sample.outcome);
            report.accepted += 1;
            touched
                .entry(endpoint_key)
                .or_insert_with_key(|key| {
                    service.get(key).unwrap_or_else(|| {
                        tracing::debug!(service = %service_key, endpoint = %key, "Tracking new endpoint");
                        EndpointState::new(key.clone(), self.window)
                    })
                })
                .add(sample.sample());
        }

        if touched.is_empty() {
            return Ok(report);
        }

        for (_, mut endpoint) in touched {
            let previous_weight = endpoint.weight();
            let previous_status = endpoint.status();

            if self.evaluator.evaluate(&mut endpoint) {
                let change = EndpointChange {
                    service: service_key.to_string(),
                    endpoint: endpoint.key().to_string(),
                    weight: endpoint.weight(),
                    status: endpoint.status(),
                    previous_weight,
                    previous_status,
                };
                metrics::record_status_change(change.status);
                report.changed.push(change);
            }
            metrics::record_endpoint_weight(service_key, endpoint.key(), endpoint.weight());
            service.put(endpoint);
        }

        self.store.put_service(service);

        if report.any_changed() {
            self.sink.publish(service_key, &report.changed);
        }
        Ok(report)
    }

    /// Health of the endpoint behind `url` in `namespace/service`.
    pub fn endpoint_status(&self, namespace: &str, service: &str, url: &Url) -> Option<EndpointHealth> {
        let endpoint = sample::endpoint_key(url)?;
        self.endpoint_health(&sample::service_key(namespace, service), &endpoint)
    }

    /// Health of an endpoint by its keys.
    pub fn endpoint_health(&self, service_key: &str, endpoint_key: &str) -> Option<EndpointHealth> {
        let service = self.store.service(service_key)?;
        service.get(endpoint_key).map(|state| EndpointHealth::from(&state))
    }

    /// Every live service with its live endpoints, sorted by key.
    pub fn snapshot(&self) -> Vec<ServiceHealth> {
        let mut services: Vec<ServiceHealth> = self
            .store
            .services()
            .iter()
            .map(|store| {
                let mut endpoints: Vec<EndpointHealth> =
                    store.endpoints().iter().map(EndpointHealth::from).collect();
                endpoints.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
                ServiceHealth {
                    service: store.service().to_string(),
                    endpoints,
                }
            })
            .collect();
        services.sort_by(|a, b| a.service.cmp(&b.service));
        services
    }

    pub fn store(&self) -> &NestedStore {
        &self.store
    }

    /// Sweep expired services and endpoints.
    pub fn evict_expired(&self) -> Evicted {
        let evicted = self.store.evict_expired();
        metrics::record_evictions("service", evicted.services);
        metrics::record_evictions("endpoint", evicted.endpoints);
        if evicted.services > 0 || evicted.endpoints > 0 {
            tracing::debug!(
                services = evicted.services,
                endpoints = evicted.endpoints,
                "Evicted idle entries"
            );
        }
        evicted
    }
}

impl BatchHandler<EndpointSample> for HealthTracker {
    type Error = DetectorError;

    fn handle(&self, key: &str, items: Vec<EndpointSample>) -> Result<(), DetectorError> {
        self.process_batch(key, items).map(|_| ())
    }
}
