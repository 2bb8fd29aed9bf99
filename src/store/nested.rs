//! Two-level endpoint storage.
//!
//! ```text
//! service key ──▶ EndpointStore ──▶ endpoint key ──▶ EndpointState
//!   (TTL: service_ttl)               (TTL: endpoint_ttl)
//! ```
//!
//! Both levels expire independently of health. An idle endpoint loses its
//! history even when quarantined.

use std::sync::Arc;
use std::time::Duration;

use crate::health::state::EndpointState;
use crate::store::clock::Clock;
use crate::store::ttl::TtlCache;

/// Endpoints of one service.
#[derive(Debug)]
pub struct EndpointStore {
    service: String,
    endpoints: TtlCache<EndpointState>,
}

impl EndpointStore {
    pub fn new(service: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            service: service.into(),
            endpoints: TtlCache::new(ttl, clock),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn get(&self, endpoint: &str) -> Option<EndpointState> {
        self.endpoints.get(endpoint)
    }

    /// Store an endpoint under its own key, restarting its TTL.
    pub fn put(&self, endpoint: EndpointState) {
        self.endpoints.add(endpoint.key().to_string(), endpoint);
    }

    pub fn endpoints(&self) -> Vec<EndpointState> {
        self.endpoints.values()
    }

    pub fn evict_expired(&self) -> usize {
        self.endpoints.evict_expired()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Counts from one janitor sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Evicted {
    pub services: usize,
    pub endpoints: usize,
}

/// Service key to [`EndpointStore`], with a TTL at each level.
#[derive(Debug)]
pub struct NestedStore {
    services: TtlCache<Arc<EndpointStore>>,
    endpoint_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl NestedStore {
    pub fn new(service_ttl: Duration, endpoint_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            services: TtlCache::new(service_ttl, clock.clone()),
            endpoint_ttl,
            clock,
        }
    }

    pub fn service(&self, service: &str) -> Option<Arc<EndpointStore>> {
        self.services.get(service)
    }

    /// Existing store for the service, or a fresh empty one. The fresh store
    /// is not registered until [`NestedStore::put_service`].
    pub fn service_or_new(&self, service: &str) -> Arc<EndpointStore> {
        self.services.get(service).unwrap_or_else(|| {
            Arc::new(EndpointStore::new(
                service,
                self.endpoint_ttl,
                self.clock.clone(),
            ))
        })
    }

    /// Register a service store, restarting its TTL.
    pub fn put_service(&self, store: Arc<EndpointStore>) {
        self.services.add(store.service().to_string(), store);
    }

    pub fn services(&self) -> Vec<Arc<EndpointStore>> {
        self.services.values()
    }

    /// Sweep both levels.
    pub fn evict_expired(&self) -> Evicted {
        let services = self.services.evict_expired();
        let endpoints = self
            .services
            .values()
            .iter()
            .map(|store| store.evict_expired())
            .sum();
        Evicted { services, endpoints }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::sample::Sample;
    use crate::store::clock::ManualClock;

    fn store() -> (NestedStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = NestedStore::new(
            Duration::from_secs(120),
            Duration::from_secs(60),
            clock.clone(),
        );
        (store, clock)
    }

    #[test]
    fn test_service_created_lazily() {
        let (store, _) = store();
        assert!(store.service("ns/a").is_none());

        let svc = store.service_or_new("ns/a");
        assert!(svc.is_empty());
        // Not registered yet.
        assert!(store.service("ns/a").is_none());

        store.put_service(svc);
        assert!(store.service("ns/a").is_some());
    }

    #[test]
    fn test_endpoint_round_trip_through_service() {
        let (store, _) = store();
        let svc = store.service_or_new("ns/a");
        let mut ep = EndpointState::new("10.0.0.1:80", 10);
        ep.add(Sample::failure());
        svc.put(ep);
        store.put_service(svc);

        let svc = store.service("ns/a").unwrap();
        let ep = svc.get("10.0.0.1:80").unwrap();
        assert_eq!(ep.window().len(), 1);
    }

    #[test]
    fn test_levels_expire_independently() {
        let (store, clock) = store();
        let svc = store.service_or_new("ns/a");
        svc.put(EndpointState::new("idle", 10));
        svc.put(EndpointState::new("busy", 10));
        store.put_service(svc);

        clock.advance(Duration::from_secs(50));
        let svc = store.service_or_new("ns/a");
        svc.put(EndpointState::new("busy", 10));
        store.put_service(svc);

        clock.advance(Duration::from_secs(20));
        let evicted = store.evict_expired();
        assert_eq!(evicted, Evicted { services: 0, endpoints: 1 });

        let svc = store.service("ns/a").unwrap();
        assert!(svc.get("idle").is_none());
        assert!(svc.get("busy").is_some());

        clock.advance(Duration::from_secs(120));
        let evicted = store.evict_expired();
        assert_eq!(evicted.services, 1);
        assert!(store.service("ns/a").is_none());
    }
}
