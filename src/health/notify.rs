//! Propagation of endpoint status changes.
//!
//! The detector only knows that an endpoint changed in a batch. What happens
//! next (push to a router, update a shared table) belongs to the sink.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::health::state::EndpointStatus;

/// One endpoint whose weight or status moved during a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointChange {
    pub service: String,
    pub endpoint: String,
    pub weight: f32,
    pub status: EndpointStatus,
    pub previous_weight: f32,
    pub previous_status: EndpointStatus,
}

impl EndpointChange {
    pub fn status_changed(&self) -> bool {
        self.status != self.previous_status
    }
}

/// Receives the changes of every batch that produced at least one.
pub trait StatusSink: Send + Sync + std::fmt::Debug {
    fn publish(&self, service: &str, changes: &[EndpointChange]);
}

/// Discards every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl StatusSink for NoopSink {
    fn publish(&self, _service: &str, _changes: &[EndpointChange]) {}
}

/// Writes every change to the log. Entering quarantine is a warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn publish(&self, service: &str, changes: &[EndpointChange]) {
        for change in changes {
            if change.status == EndpointStatus::Quarantined && change.status_changed() {
                tracing::warn!(
                    service = %service,
                    endpoint = %change.endpoint,
                    "Endpoint quarantined: too many errors"
                );
            } else {
                tracing::info!(
                    service = %service,
                    endpoint = %change.endpoint,
                    weight = change.weight,
                    previous_weight = change.previous_weight,
                    status = %change.status,
                    "Endpoint weight changed"
                );
            }
        }
    }
}

/// Forwards every change over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EndpointChange>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EndpointChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelSink {
    fn publish(&self, service: &str, changes: &[EndpointChange]) {
        for change in changes {
            if self.tx.send(change.clone()).is_err() {
                tracing::debug!(service = %service, "Status receiver dropped, change discarded");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(status: EndpointStatus, previous_status: EndpointStatus) -> EndpointChange {
        EndpointChange {
            service: "ns/etcd".into(),
            endpoint: "1.1.1.1:6443".into(),
            weight: 0.0,
            status,
            previous_weight: 0.1,
            previous_status,
        }
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        let c = change(EndpointStatus::Quarantined, EndpointStatus::Healthy);
        sink.publish("ns/etcd", std::slice::from_ref(&c));

        let got = rx.try_recv().unwrap();
        assert_eq!(got, c);
        assert!(got.status_changed());
    }

    #[test]
    fn test_channel_sink_tolerates_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.publish(
            "ns/etcd",
            &[change(EndpointStatus::Healthy, EndpointStatus::Healthy)],
        );
    }
}
