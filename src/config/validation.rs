//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacities, TTLs, step size)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DetectorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::DetectorConfig;

/// A single rejected setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `store.endpoint_ttl_secs`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint and report all violations.
pub fn validate_config(config: &DetectorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.ingestion.channel_capacity == 0 {
        errors.push(ValidationError::new(
            "ingestion.channel_capacity",
            "must be greater than 0",
        ));
    }
    if config.workers.count == 0 {
        errors.push(ValidationError::new("workers.count", "must be at least 1"));
    }
    if config.store.service_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "store.service_ttl_secs",
            "must be greater than 0",
        ));
    }
    if config.store.endpoint_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "store.endpoint_ttl_secs",
            "must be greater than 0",
        ));
    }
    if config.store.eviction_interval_secs == 0 {
        errors.push(ValidationError::new(
            "store.eviction_interval_secs",
            "must be greater than 0",
        ));
    }
    if config.evaluator.window == 0 {
        errors.push(ValidationError::new("evaluator.window", "must be at least 1"));
    }
    if !(1..=100).contains(&config.evaluator.step_percent) {
        errors.push(ValidationError::new(
            "evaluator.step_percent",
            format!("must be within 1..=100, got {}", config.evaluator.step_percent),
        ));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "invalid socket address '{}'",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
