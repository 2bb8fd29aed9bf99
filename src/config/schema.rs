//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the detector.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the failure detector.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DetectorConfig {
    /// Ingestion channel settings.
    pub ingestion: IngestionConfig,

    /// Worker pool settings.
    pub workers: WorkerConfig,

    /// Nested store expiry settings.
    pub store: StoreConfig,

    /// Weighted evaluator settings.
    pub evaluator: EvaluatorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Ingestion channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Bounded channel capacity (backpressure on callers).
    pub channel_capacity: usize,

    /// Drop samples whose url has no host instead of folding them into
    /// a shared empty endpoint key.
    pub reject_missing_host: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
            reject_missing_host: true,
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent batch workers.
    pub count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { count: 4 }
    }
}

/// Store expiry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Idle time after which a whole service is forgotten.
    pub service_ttl_secs: u64,

    /// Idle time after which a single endpoint is forgotten.
    pub endpoint_ttl_secs: u64,

    /// How often the janitor sweeps expired entries.
    pub eviction_interval_secs: u64,
}

impl StoreConfig {
    pub fn service_ttl(&self) -> Duration {
        Duration::from_secs(self.service_ttl_secs)
    }

    pub fn endpoint_ttl(&self) -> Duration {
        Duration::from_secs(self.endpoint_ttl_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            service_ttl_secs: 120,
            endpoint_ttl_secs: 60,
            eviction_interval_secs: 5,
        }
    }
}

/// Weighted evaluator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Samples kept per endpoint, and new samples needed per judgment.
    pub window: usize,

    /// Weight change per decisive judgment, in percentage points.
    pub step_percent: u8,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            window: 10,
            step_percent: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
