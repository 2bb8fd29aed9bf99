//! Passive failure detector for service endpoints.

pub mod batch;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod store;

pub use config::schema::DetectorConfig;
pub use health::{EndpointSample, FailureDetector, Outcome};
pub use lifecycle::Shutdown;
