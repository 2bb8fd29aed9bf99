//! Metrics collection and exposition.
//!
//! # Metrics
//! - `detector_samples_total` (counter): samples folded into endpoints, by outcome
//! - `detector_samples_rejected_total` (counter): samples without an endpoint key
//! - `detector_batches_total` (counter): batches handled successfully
//! - `detector_batch_size` (histogram): samples per batch
//! - `detector_batch_duration_seconds` (histogram): handler time per batch
//! - `detector_batch_failures_total` (counter): failed batches, by kind (error, panic)
//! - `detector_status_changes_total` (counter): endpoint changes, by new status
//! - `detector_endpoint_weight` (gauge): current weight per service and endpoint,
//!   dropped from the exposition once the endpoint has been idle for its TTL
//! - `detector_evictions_total` (counter): expired entries removed, by level
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_util::MetricKindMask;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::health::sample::Outcome;
use crate::health::state::EndpointStatus;

/// Exporter whose gauges disappear after `gauge_idle` without an update.
///
/// Weight gauges are only refreshed when their endpoint is touched, the same
/// event that refreshes the endpoint's TTL, so passing the endpoint TTL drops
/// a series when the store forgets its endpoint.
fn exporter(gauge_idle: Duration) -> PrometheusBuilder {
    PrometheusBuilder::new().idle_timeout(MetricKindMask::GAUGE, Some(gauge_idle))
}

/// Install the Prometheus recorder and its scrape listener on `addr`.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr, gauge_idle: Duration) {
    match exporter(gauge_idle).with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_sample(outcome: Outcome) {
    counter!("detector_samples_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_rejected_sample() {
    counter!("detector_samples_rejected_total").increment(1);
}

pub fn record_batch(size: usize, started: Instant) {
    counter!("detector_batches_total").increment(1);
    histogram!("detector_batch_size").record(size as f64);
    histogram!("detector_batch_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_batch_failure(kind: &'static str) {
    counter!("detector_batch_failures_total", "kind" => kind).increment(1);
}

pub fn record_status_change(status: EndpointStatus) {
    counter!("detector_status_changes_total", "status" => status.as_str()).increment(1);
}

pub fn record_endpoint_weight(service: &str, endpoint: &str, weight: f32) {
    gauge!(
        "detector_endpoint_weight",
        "service" => service.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .set(f64::from(weight));
}

pub fn record_evictions(level: &'static str, count: usize) {
    if count > 0 {
        counter!("detector_evictions_total", "level" => level).increment(count as u64);
    }
}
