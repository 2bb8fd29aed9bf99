//! Batching subsystem.
//!
//! # Data Flow
//! ```text
//! producers ──▶ bounded channel ──▶ pump ──▶ queue.rs add(key, item)
//!                                              │
//!               worker 0..N ◀── get() ─────────┘
//!                   │
//!                   ├─▶ handler(key, items)
//!                   └─▶ done(key)
//! ```
//!
//! # Design Decisions
//! - At most one batch per key is in flight
//! - Items of one key arrive in the order they were added
//! - The queue is a trait so deployments can bring their own

pub mod processor;
pub mod queue;

pub use processor::{BatchError, BatchHandler, BatchProcessor, KeyFn};
pub use queue::{BatchQueue, KeyedBatchQueue};
