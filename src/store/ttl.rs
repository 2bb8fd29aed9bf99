//! Key-value cache with time-to-live expiry.
//!
//! # Responsibilities
//! - Hold values by string key
//! - Hide entries whose TTL elapsed since their last write
//! - Remove expired entries when the janitor sweeps
//!
//! # Design Decisions
//! - Backed by DashMap: sharded locking, safe to share between workers
//! - Writes refresh the deadline, reads do not
//! - Time comes from an injected [`Clock`]

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::store::clock::Clock;

#[derive(Debug, Clone)]
struct TtlEntry<V> {
    value: V,
    expires_at: Instant,
}

/// A concurrent map whose entries expire `ttl` after their last write.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, TtlEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Insert or replace a value and restart its TTL.
    pub fn add(&self, key: impl Into<String>, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries.insert(key.into(), TtlEntry { value, expires_at });
    }

    /// Get a live value. An expired entry reads as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        if entry.expires_at <= now {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Snapshot of live entries.
    pub fn entries(&self) -> Vec<(String, V)> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|r| r.value().expires_at > now)
            .map(|r| (r.key().clone(), r.value().value.clone()))
            .collect()
    }

    /// Snapshot of live values.
    pub fn values(&self) -> Vec<V> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
