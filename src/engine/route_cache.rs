use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::model::{RouteCacheEntry, RouteInfo};
use crate::observability::{ROUTE_CACHE_EXPIRED_TOTAL, ROUTE_CACHE_HITS_TOTAL, ROUTE_CACHE_MISSES_TOTAL};

/// Normalized (origin, destination) pair: trimmed and case-folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    origin: String,
    destination: String,
}

impl RouteKey {
    pub fn new(origin: &str, destination: &str) -> Self {
        Self {
            origin: normalize(origin),
            destination: normalize(destination),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Memo of resolved trips with lazy expiry. Stale entries are evicted by the
/// read that finds them; nothing sweeps in the background.
pub struct RouteCache {
    entries: DashMap<RouteKey, RouteCacheEntry>,
    ttl: Duration,
}

impl RouteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, origin: &str, destination: &str) -> Option<RouteInfo> {
        self.get_at(origin, destination, Utc::now()).map(|e| e.route)
    }

    pub fn get_at(&self, origin: &str, destination: &str, now: DateTime<Utc>) -> Option<RouteCacheEntry> {
        let key = RouteKey::new(origin, destination);
        // Clone out so the shard lock is released before any eviction.
        let entry = self.entries.get(&key).map(|e| e.value().clone());
        let Some(entry) = entry else {
            metrics::counter!(ROUTE_CACHE_MISSES_TOTAL).increment(1);
            return None;
        };
        if self.is_fresh(&entry, now) {
            metrics::counter!(ROUTE_CACHE_HITS_TOTAL).increment(1);
            return Some(entry);
        }

        // A concurrent put may have refreshed the entry in between.
        self.entries.remove_if(&key, |_, e| !self.is_fresh(e, now));
        debug!(origin = %key.origin, destination = %key.destination, "route cache entry expired");
        metrics::counter!(ROUTE_CACHE_EXPIRED_TOTAL).increment(1);
        metrics::counter!(ROUTE_CACHE_MISSES_TOTAL).increment(1);
        None
    }

    pub fn put(&self, origin: &str, destination: &str, route: RouteInfo) {
        self.put_at(origin, destination, route, Utc::now());
    }

    pub fn put_at(&self, origin: &str, destination: &str, route: RouteInfo, computed_at: DateTime<Utc>) {
        self.entries.insert(
            RouteKey::new(origin, destination),
            RouteCacheEntry { route, computed_at },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, entry: &RouteCacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.computed_at <= self.ttl
    }
}
