//! Price quotes.
//!
//! Two independent strategies: distance-based fares (banded by trip length,
//! with night/rest-day surcharge, stop fees, service multiplier and pet fee)
//! and tier fares (`hours × hourly_rate`). Both round the total up to the
//! configured unit.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::limits::*;
use crate::model::*;

use super::ArbiterError;
use super::slots::Window;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Upper edge of the flat-fare band.
    pub short_band_km: f64,
    /// Upper edge of the mid band; beyond it the long-distance rate applies.
    pub long_band_km: f64,
    pub base_fare: f64,
    pub mid_rate_per_km: f64,
    pub long_rate_per_km: f64,
    pub night_surcharge_pct: f64,
    pub night: Window,
    pub rest_day: Weekday,
    pub stop_fee: f64,
    pub pet_fee: f64,
    pub hourly_multiplier: f64,
    pub event_multiplier: f64,
    pub rounding_unit: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            short_band_km: 7.0,
            long_band_km: 50.0,
            base_fare: 25.0,
            mid_rate_per_km: 2.0,
            long_rate_per_km: 2.5,
            night_surcharge_pct: 20.0,
            night: Window::new(
                TimeOfDay::midnight(),
                TimeOfDay::from_hm(6, 30).unwrap_or_else(TimeOfDay::midnight),
            ),
            rest_day: Weekday::Sun,
            stop_fee: 20.0,
            pet_fee: 15.0,
            hourly_multiplier: 1.2,
            event_multiplier: 1.3,
            rounding_unit: 5.0,
        }
    }
}

impl PricingConfig {
    /// Base fare of the long band: the mid-band price at its upper edge,
    /// which keeps the fare continuous across the boundary.
    pub fn long_base_fare(&self) -> f64 {
        self.base_fare + (self.long_band_km - self.short_band_km) * self.mid_rate_per_km
    }

    pub fn service_multiplier(&self, service: ServiceType) -> f64 {
        match service {
            ServiceType::Transfer | ServiceType::Airport => 1.0,
            ServiceType::Hourly => self.hourly_multiplier,
            ServiceType::Event => self.event_multiplier,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let amounts = [
            ("base_fare", self.base_fare),
            ("mid_rate_per_km", self.mid_rate_per_km),
            ("long_rate_per_km", self.long_rate_per_km),
            ("night_surcharge_pct", self.night_surcharge_pct),
            ("stop_fee", self.stop_fee),
            ("pet_fee", self.pet_fee),
        ];
        for (name, v) in amounts {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("{name} must be a non-negative number, got {v}"));
            }
        }
        if !(self.short_band_km > 0.0 && self.short_band_km < self.long_band_km) {
            return Err("bands must satisfy 0 < short_band_km < long_band_km".into());
        }
        if self.hourly_multiplier < 1.0 || self.event_multiplier < 1.0 {
            return Err("service multipliers must be at least 1".into());
        }
        if self.rounding_unit.is_nan() || self.rounding_unit <= 0.0 {
            return Err("rounding_unit must be positive".into());
        }
        Ok(())
    }
}

/// Round to cents, then up to the next multiple of `unit`. Never negative.
pub fn round_up(amount: f64, unit: f64) -> f64 {
    let cents = (amount * 100.0).round() / 100.0;
    ((cents / unit).ceil() * unit).max(0.0)
}

// ── Strategies ───────────────────────────────────────────────────

pub trait PricingStrategy {
    fn price(&self, config: &PricingConfig) -> PriceBreakdown;

    /// Service length implied by the pricing mode, if it fixes one.
    fn duration_minutes(&self) -> Option<u32>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistancePricing {
    pub distance_km: f64,
    pub start_time: TimeOfDay,
    pub date: NaiveDate,
    pub service: ServiceType,
    pub stop_count: u32,
    pub has_pets: bool,
}

impl DistancePricing {
    pub fn validate(&self) -> Result<(), ArbiterError> {
        if !self.distance_km.is_finite() || self.distance_km < 0.0 {
            return Err(ArbiterError::InvalidInput(format!(
                "distance must be a non-negative number, got {}",
                self.distance_km
            )));
        }
        if self.distance_km > MAX_DISTANCE_KM {
            return Err(ArbiterError::LimitExceeded("distance too long"));
        }
        if self.stop_count > MAX_STOPS {
            return Err(ArbiterError::LimitExceeded("too many stops"));
        }
        Ok(())
    }
}

impl PricingStrategy for DistancePricing {
    fn price(&self, config: &PricingConfig) -> PriceBreakdown {
        let d = self.distance_km.max(0.0);
        let (base_fare, distance_fare) = if d <= config.short_band_km {
            (config.base_fare, 0.0)
        } else if d <= config.long_band_km {
            (config.base_fare, (d - config.short_band_km) * config.mid_rate_per_km)
        } else {
            (config.long_base_fare(), (d - config.long_band_km) * config.long_rate_per_km)
        };
        let stop_fee = f64::from(self.stop_count) * config.stop_fee;
        let subtotal = base_fare + distance_fare + stop_fee;

        // Night and rest day together still surcharge once.
        let surcharged = config.night.contains(self.start_time) || self.date.weekday() == config.rest_day;
        let night_surcharge = if surcharged {
            subtotal * config.night_surcharge_pct / 100.0
        } else {
            0.0
        };

        let service_multiplier = config.service_multiplier(self.service);
        let pet_fee = if self.has_pets { config.pet_fee } else { 0.0 };
        let raw = (subtotal + night_surcharge) * service_multiplier + pet_fee;

        PriceBreakdown {
            base_fare,
            distance_fare,
            night_surcharge,
            stop_fee,
            pet_fee,
            service_multiplier,
            total: round_up(raw, config.rounding_unit),
        }
    }

    fn duration_minutes(&self) -> Option<u32> {
        None
    }
}

/// Pre-agreed hourly rate; bypasses distance banding entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct TierPricing {
    pub hours: u32,
    pub hourly_rate: f64,
}

impl TierPricing {
    pub fn validate(&self) -> Result<(), ArbiterError> {
        if self.hours == 0 {
            return Err(ArbiterError::InvalidInput("tier hours must be at least 1".into()));
        }
        if self.hours > MAX_TIER_HOURS {
            return Err(ArbiterError::LimitExceeded("too many tier hours"));
        }
        if !self.hourly_rate.is_finite() || self.hourly_rate < 0.0 {
            return Err(ArbiterError::InvalidInput(format!(
                "hourly rate must be a non-negative number, got {}",
                self.hourly_rate
            )));
        }
        if self.hourly_rate > MAX_HOURLY_RATE {
            return Err(ArbiterError::LimitExceeded("hourly rate too high"));
        }
        Ok(())
    }
}

impl PricingStrategy for TierPricing {
    fn price(&self, config: &PricingConfig) -> PriceBreakdown {
        let base_fare = f64::from(self.hours) * self.hourly_rate;
        PriceBreakdown {
            base_fare,
            distance_fare: 0.0,
            night_surcharge: 0.0,
            stop_fee: 0.0,
            pet_fee: 0.0,
            service_multiplier: 1.0,
            total: round_up(base_fare, config.rounding_unit),
        }
    }

    fn duration_minutes(&self) -> Option<u32> {
        derive_duration_minutes(Some(self.hours), None)
    }
}

/// Pricing mode selected by the booking.
#[derive(Debug, Clone, PartialEq)]
pub enum PricingMode {
    Distance(DistancePricing),
    Tier(TierPricing),
}

impl PricingMode {
    /// The mode a booking priced from `input` has when it starts at `start_time` on `date`.
    pub fn for_booking(input: &PricingInput, date: NaiveDate, start_time: TimeOfDay) -> Self {
        match *input {
            PricingInput::Distance {
                distance_km,
                service,
                stop_count,
                has_pets,
            } => PricingMode::Distance(DistancePricing {
                distance_km,
                start_time,
                date,
                service,
                stop_count,
                has_pets,
            }),
            PricingInput::Tier { hours, hourly_rate } => PricingMode::Tier(TierPricing { hours, hourly_rate }),
        }
    }

    pub fn validate(&self) -> Result<(), ArbiterError> {
        match self {
            PricingMode::Distance(p) => p.validate(),
            PricingMode::Tier(p) => p.validate(),
        }
    }

    fn strategy(&self) -> &dyn PricingStrategy {
        match self {
            PricingMode::Distance(p) => p,
            PricingMode::Tier(p) => p,
        }
    }

    pub fn price(&self, config: &PricingConfig) -> PriceBreakdown {
        self.strategy().price(config)
    }

    pub fn duration_minutes(&self) -> Option<u32> {
        self.strategy().duration_minutes()
    }
}

/// Distance-based quote for already-validated inputs.
pub fn quote(
    distance_km: f64,
    start_time: TimeOfDay,
    date: NaiveDate,
    service: ServiceType,
    stop_count: u32,
    has_pets: bool,
    config: &PricingConfig,
) -> PriceBreakdown {
    DistancePricing {
        distance_km,
        start_time,
        date,
        service,
        stop_count,
        has_pets,
    }
    .price(config)
}
