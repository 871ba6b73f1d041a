use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::model::*;
use crate::observability::{BOOKINGS_COMMITTED_TOTAL, BOOKING_CONFLICTS_TOTAL};

use super::conflict::{check_no_conflict, validate_duration, validate_kind, validate_label};
use super::pricing::{PricingMode, TierPricing};
use super::queries::TripRequest;
use super::{Arbiter, ArbiterError, DateGuards};

/// How a booking is priced. The engine derives the breakdown; clients never
/// supply one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BookingPricing {
    /// Distance fare over the routed trip.
    Trip {
        origin: String,
        destination: String,
        #[serde(default)]
        stops: Vec<String>,
        #[serde(default = "default_service")]
        service: ServiceType,
        #[serde(default)]
        has_pets: bool,
    },
    /// Pre-agreed hourly tier.
    Tier { hours: u32, hourly_rate: f64 },
}

fn default_service() -> ServiceType {
    ServiceType::Transfer
}

/// A customer booking request. `hours` (tier mode) takes precedence over
/// `duration_minutes` when both are given. Without either, a tier books its
/// hours and a trip books its travel time.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub hours: Option<u32>,
    pub duration_minutes: Option<u32>,
    pub pricing: Option<BookingPricing>,
    pub label: Option<String>,
}

impl Arbiter {
    /// Commit a new customer booking with status `requested`.
    pub async fn book(&self, req: BookingRequest) -> Result<BookingRecord, ArbiterError> {
        validate_label(req.label.as_deref())?;

        let mut hours = req.hours;
        let mut travel_minutes = None;
        let pricing = match req.pricing {
            None => None,
            Some(BookingPricing::Tier { hours: tier_hours, hourly_rate }) => {
                TierPricing {
                    hours: tier_hours,
                    hourly_rate,
                }
                .validate()?;
                if hours.is_some_and(|h| h != tier_hours) {
                    return Err(ArbiterError::InvalidInput("hours must match the tier hours".into()));
                }
                hours = Some(tier_hours);
                Some(PricingInput::Tier {
                    hours: tier_hours,
                    hourly_rate,
                })
            }
            Some(BookingPricing::Trip {
                origin,
                destination,
                stops,
                service,
                has_pets,
            }) => {
                let trip = TripRequest {
                    origin,
                    destination,
                    stops,
                    date: req.date,
                    start_time: req.start_time,
                    service,
                    has_pets,
                };
                let (input, route) = self.route_pricing(&trip).await?;
                travel_minutes = Some(route.duration_min.max(1));
                Some(input)
            }
        };

        let duration_minutes = derive_duration_minutes(hours, req.duration_minutes.or(travel_minutes))
            .ok_or_else(|| ArbiterError::InvalidInput("hours or duration_minutes is required".into()))?;
        validate_duration(duration_minutes)?;

        self.commit_new(NewBooking {
            date: req.date,
            start_time: req.start_time,
            kind: RecordKind::Booking { duration_minutes },
            status: BookingStatus::Requested,
            pricing,
            price: None,
            label: req.label,
        })
        .await
    }

    /// Reserve `[start, end)` for the operator. An `end` at or before `start`
    /// runs into the next day.
    pub async fn block(
        &self,
        date: NaiveDate,
        start_time: TimeOfDay,
        end: TimeOfDay,
        label: Option<String>,
    ) -> Result<BookingRecord, ArbiterError> {
        validate_label(label.as_deref())?;
        self.commit_new(NewBooking {
            date,
            start_time,
            kind: RecordKind::Block { end },
            status: BookingStatus::Confirmed,
            pricing: None,
            price: None,
            label,
        })
        .await
    }

    /// Move a record to a new date and start time, keeping its length and
    /// repricing it for the new time. Its own prior interval never conflicts
    /// with the move.
    pub async fn reschedule(
        &self,
        id: RecordId,
        date: NaiveDate,
        start_time: TimeOfDay,
    ) -> Result<BookingRecord, ArbiterError> {
        let target = |r: &BookingRecord| {
            let mut moved = r.clone();
            moved.date = date;
            moved.start_time = start_time;
            moved.status = BookingStatus::Rescheduled;
            moved.price = self.derive_price(moved.pricing.as_ref(), date, start_time);
            moved
        };

        let (current, _guards) = self.lock_record(id, |r| target(r).span().dates()).await?;
        if !current.status.can_reschedule() {
            return Err(ArbiterError::InvalidTransition {
                from: current.status,
                to: BookingStatus::Rescheduled,
            });
        }
        let moved = target(&current);
        validate_kind(&moved.kind)?;

        let span = moved.span();
        let busy = self.busy_around(&span.dates()).await?;
        self.guard_conflict(&span, &busy, Some(id))?;

        self.store.update(id, moved.clone()).await?;
        metrics::counter!(BOOKINGS_COMMITTED_TOTAL, "kind" => "reschedule").increment(1);
        info!(%id, from = %current.date, to = %date, start = %start_time, "rescheduled");
        Ok(moved)
    }

    /// Apply a status change allowed by the booking lifecycle.
    pub async fn transition(&self, id: RecordId, to: BookingStatus) -> Result<BookingRecord, ArbiterError> {
        let (current, _guards) = self.lock_record(id, |_| Vec::new()).await?;
        if !current.status.can_transition_to(to) {
            return Err(ArbiterError::InvalidTransition {
                from: current.status,
                to,
            });
        }
        // Every allowed target is either busy or frees the slot, and no
        // non-busy status can become busy, so no conflict check is needed.
        let mut next = current.clone();
        next.status = to;
        self.store.update(id, next.clone()).await?;
        info!(%id, from = %current.status, %to, "status changed");
        Ok(next)
    }

    pub async fn cancel(&self, id: RecordId) -> Result<BookingRecord, ArbiterError> {
        self.transition(id, BookingStatus::Cancelled).await
    }

    // ── Internals ────────────────────────────────────────────────

    fn derive_price(
        &self,
        pricing: Option<&PricingInput>,
        date: NaiveDate,
        start_time: TimeOfDay,
    ) -> Option<PriceBreakdown> {
        pricing.map(|input| PricingMode::for_booking(input, date, start_time).price(&self.pricing))
    }

    /// Lock, read busy records, check, price, insert.
    async fn commit_new(&self, mut new: NewBooking) -> Result<BookingRecord, ArbiterError> {
        validate_kind(&new.kind)?;
        let span = new.span();
        let dates = span.dates();
        let _guards = self.lock_dates(dates.clone()).await;
        new.price = self.derive_price(new.pricing.as_ref(), new.date, new.start_time);

        let busy = self.busy_around(&dates).await?;
        self.guard_conflict(&span, &busy, None)?;

        let kind = if matches!(new.kind, RecordKind::Block { .. }) { "block" } else { "booking" };
        let id = self.store.insert(new.clone()).await?;
        metrics::counter!(BOOKINGS_COMMITTED_TOTAL, "kind" => kind).increment(1);
        info!(%id, kind, date = %new.date, start = %new.start_time, "committed");
        Ok(new.with_id(id))
    }

    fn guard_conflict(
        &self,
        span: &Span,
        busy: &[BusyRecord],
        exclude: Option<RecordId>,
    ) -> Result<(), ArbiterError> {
        check_no_conflict(span, busy, exclude).inspect_err(|e| {
            metrics::counter!(BOOKING_CONFLICTS_TOTAL).increment(1);
            info!(start = %span.start, end = %span.end, error = %e, "rejected overlapping write");
        })
    }

    /// Read `id` and hold the locks of every date its current interval and
    /// `extra(record)` touch. Retries if the record moved before the locks
    /// were held.
    async fn lock_record<F>(
        &self,
        id: RecordId,
        extra: F,
    ) -> Result<(BookingRecord, DateGuards<'_>), ArbiterError>
    where
        F: Fn(&BookingRecord) -> Vec<NaiveDate>,
    {
        let mut seen = self.store.get(id).await?;
        loop {
            let mut dates = seen.span().dates();
            dates.extend(extra(&seen));
            let guards = self.lock_dates(dates).await;
            let current = self.store.get(id).await?;
            if current.span() == seen.span() {
                return Ok((current, guards));
            }
            drop(guards);
            seen = current;
        }
    }
}
