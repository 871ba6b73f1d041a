use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::limits::MAX_STOPS;
use crate::model::*;
use crate::observability::AVAILABILITY_DEGRADED_TOTAL;

use super::availability::resolve_free_slots;
use super::conflict::{validate_address, validate_duration};
use super::pricing::{PricingMode, TierPricing};
use super::slots::generate_slots;
use super::{Arbiter, ArbiterError};

/// Free start times for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub date: NaiveDate,
    pub duration_minutes: u32,
    pub slots: Vec<TimeOfDay>,
    /// Busy records could not be read; `slots` is the bare template.
    pub degraded: bool,
}

/// A distance-priced trip to quote.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRequest {
    pub origin: String,
    pub destination: String,
    pub stops: Vec<String>,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub service: ServiceType,
    pub has_pets: bool,
}

impl TripRequest {
    fn validate(&self) -> Result<(), ArbiterError> {
        validate_address("origin", &self.origin)?;
        validate_address("destination", &self.destination)?;
        if self.stops.len() > MAX_STOPS as usize {
            return Err(ArbiterError::LimitExceeded("too many stops"));
        }
        for stop in &self.stops {
            validate_address("stop", stop)?;
        }
        Ok(())
    }
}

impl Arbiter {
    /// Start times on `date` that can host `duration_minutes` without
    /// overlapping a busy record. A store failure degrades to the full
    /// template instead of failing.
    pub async fn available_slots(
        &self,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Availability, ArbiterError> {
        validate_duration(duration_minutes)?;

        let next = date.succ_opt().unwrap_or(date);
        let (slots, degraded) = match self.busy_around(&[date, next]).await {
            Ok(busy) => (resolve_free_slots(date, duration_minutes, &busy, &self.template), false),
            Err(e) => {
                warn!(%date, error = %e, "busy records unavailable, serving full template (degraded)");
                metrics::counter!(AVAILABILITY_DEGRADED_TOTAL).increment(1);
                (generate_slots(date, &self.template), true)
            }
        };
        debug!(%date, duration_minutes, free = slots.len(), degraded, "resolved availability");

        Ok(Availability {
            date,
            duration_minutes,
            slots,
            degraded,
        })
    }

    /// Distance-based quote. The trip's route comes from the cache or the
    /// routing collaborator; its travel time is the quoted duration.
    pub async fn quote_trip(&self, trip: &TripRequest) -> Result<Quote, ArbiterError> {
        let (input, route) = self.route_pricing(trip).await?;
        Ok(Quote {
            breakdown: PricingMode::for_booking(&input, trip.date, trip.start_time).price(&self.pricing),
            duration_minutes: route.duration_min.max(1),
            route: Some(route),
        })
    }

    /// Validate and route a trip, returning the pricing inputs a booking of
    /// it stores alongside the route they came from.
    pub(super) async fn route_pricing(&self, trip: &TripRequest) -> Result<(PricingInput, RouteInfo), ArbiterError> {
        trip.validate()?;
        let route = self.resolve_route(&trip.origin, &trip.destination, &trip.stops).await?;

        let input = PricingInput::Distance {
            distance_km: route.distance_km,
            service: trip.service,
            stop_count: trip.stops.len() as u32,
            has_pets: trip.has_pets,
        };
        // A route the collaborator returned can still be out of range.
        PricingMode::for_booking(&input, trip.date, trip.start_time)
            .validate()
            .map_err(|e| ArbiterError::QuoteUnavailable(e.to_string()))?;
        Ok((input, route))
    }

    /// Pre-agreed hourly tier. No route is needed.
    pub fn quote_tier(&self, hours: u32, hourly_rate: f64) -> Result<Quote, ArbiterError> {
        let mode = PricingMode::Tier(TierPricing { hours, hourly_rate });
        mode.validate()?;
        let duration_minutes = mode
            .duration_minutes()
            .ok_or(ArbiterError::LimitExceeded("too many tier hours"))?;
        Ok(Quote {
            breakdown: mode.price(&self.pricing),
            duration_minutes,
            route: None,
        })
    }

    /// Every non-cancelled record starting on `date`, ordered by start time.
    pub async fn list_day(&self, date: NaiveDate) -> Result<Vec<BookingRecord>, ArbiterError> {
        let mut records = self.store.list_active(Some(date)).await?;
        records.sort_by_key(|r| (r.start_time, r.id));
        Ok(records)
    }

    pub fn clear_route_cache(&self) {
        self.cache.clear();
    }
}
