//! Outcome samples pushed by callers.
//!
//! # Responsibilities
//! - Carry one request outcome for one endpoint of one service
//! - Derive the service key (`namespace/service`) used for batching
//! - Derive the endpoint key (`host:port`) used for scoring
//!
//! # Design Decisions
//! - Only success vs failure is kept; error details are not retained
//! - A sample without a usable host has no endpoint key (`None`)

use serde::{Deserialize, Serialize};
use url::Url;

/// Outcome of a single request against an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// Map any `Result` to an outcome. Only `Ok` vs `Err` matters.
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(_) => Outcome::Failure,
        }
    }

    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

/// The retained unit stored in an endpoint's history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub outcome: Outcome,
}

impl Sample {
    pub fn success() -> Self {
        Self { outcome: Outcome::Success }
    }

    pub fn failure() -> Self {
        Self { outcome: Outcome::Failure }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failure
    }
}

impl From<Outcome> for Sample {
    fn from(outcome: Outcome) -> Self {
        Self { outcome }
    }
}

/// A request outcome observed by an external caller (proxy, balancer, probe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSample {
    pub namespace: String,
    pub service: String,
    /// Scheme and host of the endpoint. The host is the endpoint identity.
    pub url: Option<Url>,
    pub outcome: Outcome,
}

impl EndpointSample {
    pub fn new(
        namespace: impl Into<String>,
        service: impl Into<String>,
        url: Option<Url>,
        outcome: Outcome,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            service: service.into(),
            url,
            outcome,
        }
    }

    /// Build a sample from the result of a request.
    pub fn from_result<T, E>(
        namespace: impl Into<String>,
        service: impl Into<String>,
        url: Url,
        result: &Result<T, E>,
    ) -> Self {
        Self::new(namespace, service, Some(url), Outcome::from_result(result))
    }

    /// Batching key, `namespace/service`.
    pub fn service_key(&self) -> String {
        service_key(&self.namespace, &self.service)
    }

    /// Scoring key, the url host with its explicit port if any.
    pub fn endpoint_key(&self) -> Option<String> {
        self.url.as_ref().and_then(endpoint_key)
    }

    pub fn sample(&self) -> Sample {
        Sample::from(self.outcome)
    }
}

/// Format the service key for a namespace and service.
pub fn service_key(namespace: &str, service: &str) -> String {
    format!("{}/{}", namespace, service)
}

/// Extract `host:port` from a url. A scheme's default port is written out,
/// so the key names the socket whatever the scheme.
pub fn endpoint_key(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port_or_known_default() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
