//! In-memory storage subsystem.
//!
//! # Data Flow
//! ```text
//! batch handler
//!     → nested.rs (service → endpoint store → endpoint state)
//!     → ttl.rs (expiring concurrent maps at both levels)
//!     → clock.rs (injected time source)
//!
//! janitor tick
//!     → nested.rs evict_expired (services, then endpoints)
//! ```
//!
//! # Design Decisions
//! - Nothing is persisted; a restart starts from an empty store
//! - Entries are only removed by expiry, never by the detector
//! - Mutation of one service is serialized by the batch queue, not here

pub mod clock;
pub mod nested;
pub mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use nested::{EndpointStore, Evicted, NestedStore};
pub use ttl::TtlCache;
