//! Health scoring subsystem.
//!
//! # Data Flow
//! ```text
//! Caller reports an outcome (sample.rs)
//!     → passive.rs collector channel → batch queue (by service)
//!     → tracker.rs folds the batch into endpoint state (state.rs)
//!     → window.rs keeps the last K samples per endpoint
//!     → evaluator.rs judges each touched endpoint once
//!     → notify.rs publishes endpoints whose weight/status moved
//! ```
//!
//! # Design Decisions
//! - Passive only: no probes are sent
//! - Weight moves in fixed steps after a full window of new samples
//! - Health state is per-endpoint, grouped per service

pub mod evaluator;
pub mod notify;
pub mod passive;
pub mod sample;
pub mod state;
pub mod tracker;
pub mod window;

pub use evaluator::{StatusEvaluator, WeightedEvaluator};
pub use notify::{ChannelSink, EndpointChange, LogSink, NoopSink, StatusSink};
pub use passive::{FailureDetector, FailureDetectorBuilder};
pub use sample::{EndpointSample, Outcome, Sample};
pub use state::{EndpointState, EndpointStatus};
pub use tracker::{
    BatchReport, DetectorError, DetectorResult, EndpointHealth, HealthTracker, ServiceHealth,
};
