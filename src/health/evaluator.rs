//! Weighted endpoint evaluation.
//!
//! # Responsibilities
//! - Decide when an endpoint has enough new samples to be judged
//! - Move the weight one step down on a window of only failures
//! - Move the weight one step up on a window of only successes
//!
//! # Design Decisions
//! - A single outlier never moves the score; only a uniform window does
//! - The new-sample counter resets after every judgment, mixed or not
//! - Weight steps are integer percentage points

use crate::health::state::{EndpointState, FULL_WEIGHT};

/// Policy that turns an endpoint's history into weight and status.
pub trait StatusEvaluator: Send + Sync + std::fmt::Debug {
    /// Samples the policy judges at once. Endpoint histories hold this many.
    fn window(&self) -> usize;

    /// Judge the endpoint. Returns true if weight or status changed.
    fn evaluate(&self, endpoint: &mut EndpointState) -> bool;
}

/// Hysteretic evaluator stepping the weight by a fixed amount per window.
#[derive(Debug, Clone)]
pub struct WeightedEvaluator {
    window: usize,
    step_pct: u8,
}

impl WeightedEvaluator {
    /// `window` samples per judgment, `step_pct` percentage points per step.
    pub fn new(window: usize, step_pct: u8) -> Self {
        Self {
            window: window.max(1),
            step_pct: step_pct.min(FULL_WEIGHT),
        }
    }

}

impl Default for WeightedEvaluator {
    fn default() -> Self {
        Self::new(10, 10)
    }
}

impl StatusEvaluator for WeightedEvaluator {
    fn window(&self) -> usize {
        self.window
    }

    fn evaluate(&self, endpoint: &mut EndpointState) -> bool {
        if endpoint.since_judgment() < self.window {
            return false;
        }

        let mut failures = 0usize;
        let mut total = 0usize;
        for sample in endpoint.window().iter() {
            total += 1;
            if sample.is_failure() {
                failures += 1;
            }
        }

        let current = endpoint.weight_pct();
        let next = if total > 0 && failures == total {
            current.saturating_sub(self.step_pct)
        } else if failures == 0 {
            current.saturating_add(self.step_pct).min(FULL_WEIGHT)
        } else {
            current
        };

        endpoint.apply_judgment(next)
    }
}
