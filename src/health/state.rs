//! Per-endpoint health state.
//!
//! # States
//! - Healthy: endpoint receives traffic, possibly at a reduced weight
//! - Quarantined: weight dropped to zero, endpoint should be excluded
//!
//! # State Transitions
//! ```text
//! Healthy → Quarantined: weight reaches 0
//! Quarantined → Healthy: weight rises above 0
//! ```
//!
//! # Design Decisions
//! - Weight is kept in integer percentage points to avoid float drift
//! - Status is derived from weight, never set independently
//! - Judgments only happen after a full window of new samples

use serde::{Deserialize, Serialize};

use crate::health::sample::Sample;
use crate::health::window::SampleWindow;

/// Weight of a fresh endpoint, in percentage points.
pub const FULL_WEIGHT: u8 = 100;

/// Health status exposed to the routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Healthy,
    /// Too many errors: the weight has been driven to zero.
    Quarantined,
}

impl EndpointStatus {
    pub fn for_weight(weight_pct: u8) -> Self {
        if weight_pct == 0 {
            EndpointStatus::Quarantined
        } else {
            EndpointStatus::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointStatus::Healthy => "healthy",
            EndpointStatus::Quarantined => "quarantined",
        }
    }
}

impl std::fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the detector keeps about one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointState {
    key: String,
    window: SampleWindow,
    since_judgment: usize,
    weight_pct: u8,
    status: EndpointStatus,
}

impl EndpointState {
    /// A fresh endpoint: full weight, healthy, empty history.
    pub fn new(key: impl Into<String>, capacity: usize) -> Self {
        Self {
            key: key.into(),
            window: SampleWindow::new(capacity),
            since_judgment: 0,
            weight_pct: FULL_WEIGHT,
            status: EndpointStatus::Healthy,
        }
    }

    /// Append a sample to the history.
    pub fn add(&mut self, sample: Sample) {
        self.window.add(sample);
        self.since_judgment = self.since_judgment.saturating_add(1);
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    /// Samples added since the last judgment.
    pub fn since_judgment(&self) -> usize {
        self.since_judgment
    }

    pub fn weight_pct(&self) -> u8 {
        self.weight_pct
    }

    /// Weight in `[0.0, 1.0]`.
    pub fn weight(&self) -> f32 {
        f32::from(self.weight_pct) / 100.0
    }

    pub fn status(&self) -> EndpointStatus {
        self.status
    }

    pub fn is_healthy(&self) -> bool {
        self.status == EndpointStatus::Healthy
    }

    /// Record a judgment. Weight is clamped to `0..=100` and the status
    /// follows it. Returns true if weight or status moved.
    pub(crate) fn apply_judgment(&mut self, weight_pct: u8) -> bool {
        let weight_pct = weight_pct.min(FULL_WEIGHT);
        let status = EndpointStatus::for_weight(weight_pct);
        let changed = weight_pct != self.weight_pct || status != self.status;

        self.weight_pct = weight_pct;
        self.status = status;
        self.since_judgment = 0;
        changed
    }
}
