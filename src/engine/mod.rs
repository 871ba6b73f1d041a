mod availability;
mod conflict;
mod error;
mod mutations;
mod pricing;
mod queries;
mod route_cache;
mod routing;
mod slots;
mod store;

pub use availability::{busy_records, merge_overlapping, resolve_free_slots};
pub use conflict::{find_conflict, has_conflict};
pub use error::{ArbiterError, RouteError, StoreError};
pub use mutations::{BookingPricing, BookingRequest};
pub use pricing::{
    DistancePricing, PricingConfig, PricingMode, PricingStrategy, TierPricing, quote, round_up,
};
pub use queries::{Availability, TripRequest};
pub use route_cache::{RouteCache, RouteKey};
pub use routing::{RouteTableEntry, Router, StaticRouter};
pub use slots::{WeeklyTemplate, Window, generate_slots};
pub use store::{BookingStore, InMemoryStore, WalStore};

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::model::*;
use crate::observability::ROUTE_COMPUTATIONS_TOTAL;

/// Tunables for an [`Arbiter`].
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    pub pricing: PricingConfig,
    pub template: WeeklyTemplate,
    pub route_ttl: chrono::Duration,
    /// Extra attempts after a transient routing failure.
    pub route_retries: u32,
    pub route_backoff: Duration,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            pricing: PricingConfig::default(),
            template: WeeklyTemplate::default(),
            route_ttl: chrono::Duration::hours(24),
            route_retries: 2,
            route_backoff: Duration::from_millis(100),
        }
    }
}

/// Held date locks. Dropping them releases the locks and removes table
/// entries no other task holds or waits on.
pub(super) struct DateGuards<'a> {
    table: &'a DashMap<NaiveDate, Arc<Mutex<()>>>,
    dates: Vec<NaiveDate>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for DateGuards<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        for date in &self.dates {
            // Entry creation clones under the same shard lock, so a count
            // of one means nobody else can be holding or awaiting it.
            self.table.remove_if(date, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

/// Booking arbitration core for a single vehicle.
///
/// Writes are serialized per calendar date: a write takes the lock of every
/// date its interval touches, in ascending order, and holds them across the
/// busy read, the conflict check and the store write.
pub struct Arbiter {
    pub(super) store: Arc<dyn BookingStore>,
    router: Arc<dyn Router>,
    cache: RouteCache,
    pub(super) pricing: PricingConfig,
    pub(super) template: WeeklyTemplate,
    route_retries: u32,
    route_backoff: Duration,
    date_locks: DashMap<NaiveDate, Arc<Mutex<()>>>,
}

impl Arbiter {
    pub fn new(store: Arc<dyn BookingStore>, router: Arc<dyn Router>, config: ArbiterConfig) -> Self {
        Self {
            store,
            router,
            cache: RouteCache::new(config.route_ttl),
            pricing: config.pricing,
            template: config.template,
            route_retries: config.route_retries,
            route_backoff: config.route_backoff,
            date_locks: DashMap::new(),
        }
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    pub fn template(&self) -> &WeeklyTemplate {
        &self.template
    }

    pub fn route_cache(&self) -> &RouteCache {
        &self.cache
    }

    // ── Date locks ───────────────────────────────────────────────

    fn date_lock(&self, date: NaiveDate) -> Arc<Mutex<()>> {
        self.date_locks.entry(date).or_default().value().clone()
    }

    /// Acquire the locks of `dates` in sorted order to prevent deadlocks.
    pub(super) async fn lock_dates(&self, mut dates: Vec<NaiveDate>) -> DateGuards<'_> {
        dates.sort();
        dates.dedup();
        let mut guards = Vec::with_capacity(dates.len());
        for date in &dates {
            guards.push(self.date_lock(*date).lock_owned().await);
        }
        debug!(dates = ?dates, "acquired date locks");
        DateGuards {
            table: &self.date_locks,
            dates,
            guards,
        }
    }

    /// Busy records that could overlap an interval touching `dates`: records
    /// starting on any of them or on the day before the first.
    pub(super) async fn busy_around(&self, dates: &[NaiveDate]) -> Result<Vec<BusyRecord>, StoreError> {
        let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) else {
            return Ok(Vec::new());
        };
        let mut busy = Vec::new();
        let mut day = first.pred_opt().unwrap_or(*first);
        while day <= *last {
            let records = self.store.list_active(Some(day)).await?;
            busy.extend(busy_records(&records));
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        Ok(busy)
    }

    // ── Routing ──────────────────────────────────────────────────

    /// Cache first, then the routing collaborator with bounded retry on
    /// transient failures. Trips with stops are keyed by more than the
    /// endpoints, so they never touch the cache.
    pub(super) async fn resolve_route(
        &self,
        origin: &str,
        destination: &str,
        stops: &[String],
    ) -> Result<RouteInfo, ArbiterError> {
        let cacheable = stops.is_empty();
        if cacheable && let Some(route) = self.cache.get(origin, destination) {
            debug!(origin, destination, "route cache hit");
            return Ok(route);
        }

        let mut attempt = 0u32;
        loop {
            match self.router.compute_route(origin, destination, stops).await {
                Ok(route) => {
                    metrics::counter!(ROUTE_COMPUTATIONS_TOTAL, "status" => "ok").increment(1);
                    if cacheable {
                        self.cache.put(origin, destination, route.clone());
                    }
                    return Ok(route);
                }
                Err(e) if e.is_transient() && attempt < self.route_retries => {
                    metrics::counter!(ROUTE_COMPUTATIONS_TOTAL, "status" => "retry").increment(1);
                    attempt += 1;
                    warn!(origin, destination, attempt, error = %e, "routing failed, retrying");
                    tokio::time::sleep(self.route_backoff * attempt).await;
                }
                Err(e) => {
                    metrics::counter!(ROUTE_COMPUTATIONS_TOTAL, "status" => "error").increment(1);
                    return Err(ArbiterError::QuoteUnavailable(e.to_string()));
                }
            }
        }
    }
}
