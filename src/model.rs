use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use ulid::Ulid;

pub type RecordId = Ulid;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid time of day {0:?} (expected HH:MM)")]
    Time(String),
    #[error("unknown status {0:?}")]
    Status(String),
    #[error("unknown service type {0:?}")]
    Service(String),
}

// ── Time of day ─────────────────────────────────────────────────

/// Local wall-clock time at minute precision, rendered as `HH:MM`.
///
/// `24:00` is accepted on input and normalized to `00:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn midnight() -> Self {
        Self(NaiveTime::MIN)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour == 24 && minute == 0 {
            return Some(Self::midnight());
        }
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Minutes since midnight. `1440` wraps to `00:00`.
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        if !(0..=MINUTES_PER_DAY).contains(&minutes) {
            return None;
        }
        let m = minutes % MINUTES_PER_DAY;
        Self::from_hm((m / 60) as u32, (m % 60) as u32)
    }

    pub fn minutes(&self) -> i64 {
        i64::from(self.0.hour()) * 60 + i64::from(self.0.minute())
    }

    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.0)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseError::Time(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(bad());
        }
        let hour: u32 = h.parse().map_err(|_| bad())?;
        let minute: u32 = m.parse().map_err(|_| bad())?;
        Self::from_hm(hour, minute).ok_or_else(bad)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Intervals ───────────────────────────────────────────────────

/// Half-open interval `[start, end)` in local civil time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn starting_at(start: NaiveDateTime, minutes: u32) -> Self {
        Self::new(start, start + Duration::minutes(i64::from(minutes)))
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Every civil date this span occupies at least one instant of.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let last = (self.end - Duration::nanoseconds(1)).date();
        self.start.date().iter_days().take_while(|d| *d <= last).collect()
    }
}

// ── Booking records ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    Proposed,
    Confirmed,
    Rescheduled,
    Executed,
    Declined,
    Cancelled,
}

impl BookingStatus {
    /// Whether a record in this status occupies its interval.
    pub fn is_busy(self) -> bool {
        !matches!(self, BookingStatus::Declined | BookingStatus::Cancelled)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Executed | BookingStatus::Declined | BookingStatus::Cancelled
        )
    }

    /// Whether the date/time of a record in this status may still be moved.
    pub fn can_reschedule(self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Requested, Proposed | Confirmed | Declined | Cancelled)
                | (Proposed, Confirmed | Declined | Cancelled)
                | (Confirmed, Executed | Cancelled)
                | (Rescheduled, Confirmed | Executed | Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::Proposed => "proposed",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rescheduled => "rescheduled",
            BookingStatus::Executed => "executed",
            BookingStatus::Declined => "declined",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requested" => Ok(BookingStatus::Requested),
            "proposed" => Ok(BookingStatus::Proposed),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "rescheduled" => Ok(BookingStatus::Rescheduled),
            "executed" => Ok(BookingStatus::Executed),
            "declined" => Ok(BookingStatus::Declined),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            _ => Err(ParseError::Status(s.to_string())),
        }
    }
}

/// How a record's interval end is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Customer booking: end = start + duration.
    Booking { duration_minutes: u32 },
    /// Operator block with an explicit end. An end at or before the start
    /// falls on the following day.
    Block { end: TimeOfDay },
}

/// A record before the store has assigned its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBooking {
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub kind: RecordKind,
    pub status: BookingStatus,
    pub pricing: Option<PricingInput>,
    /// Derived from `pricing` at the record's date and start time.
    pub price: Option<PriceBreakdown>,
    pub label: Option<String>,
}

impl NewBooking {
    pub fn with_id(self, id: RecordId) -> BookingRecord {
        BookingRecord {
            id,
            date: self.date,
            start_time: self.start_time,
            kind: self.kind,
            status: self.status,
            pricing: self.pricing,
            price: self.price,
            label: self.label,
        }
    }

    pub fn span(&self) -> Span {
        record_span(self.date, self.start_time, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: RecordId,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub kind: RecordKind,
    pub status: BookingStatus,
    pub pricing: Option<PricingInput>,
    pub price: Option<PriceBreakdown>,
    pub label: Option<String>,
}

impl BookingRecord {
    pub fn is_block(&self) -> bool {
        matches!(self.kind, RecordKind::Block { .. })
    }

    pub fn span(&self) -> Span {
        record_span(self.date, self.start_time, self.kind)
    }

    /// The scheduling view of this record, or `None` if it no longer occupies time.
    pub fn busy(&self) -> Option<BusyRecord> {
        if !self.status.is_busy() {
            return None;
        }
        let start = self.start_time.on(self.date);
        Some(match self.kind {
            RecordKind::Booking { duration_minutes } => BusyRecord::NormalBooking {
                id: self.id,
                start,
                duration_minutes,
            },
            RecordKind::Block { end } => BusyRecord::BlockWindow {
                id: self.id,
                start,
                end: block_end(self.date, self.start_time, end),
            },
        })
    }
}

fn block_end(date: NaiveDate, start: TimeOfDay, end: TimeOfDay) -> NaiveDateTime {
    if end > start {
        end.on(date)
    } else {
        end.on(date) + Duration::days(1)
    }
}

fn record_span(date: NaiveDate, start_time: TimeOfDay, kind: RecordKind) -> Span {
    let start = start_time.on(date);
    match kind {
        RecordKind::Booking { duration_minutes } => Span::starting_at(start, duration_minutes),
        RecordKind::Block { end } => Span::new(start, block_end(date, start_time, end)),
    }
}

/// Resolve a booking's length: tiered `hours` take precedence over a raw duration.
pub fn derive_duration_minutes(hours: Option<u32>, duration_minutes: Option<u32>) -> Option<u32> {
    match (hours, duration_minutes) {
        (Some(h), _) => h.checked_mul(60),
        (None, d) => d,
    }
}

/// An interval that excludes availability. The end is derived per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyRecord {
    NormalBooking {
        id: RecordId,
        start: NaiveDateTime,
        duration_minutes: u32,
    },
    BlockWindow {
        id: RecordId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl BusyRecord {
    pub fn id(&self) -> RecordId {
        match self {
            BusyRecord::NormalBooking { id, .. } | BusyRecord::BlockWindow { id, .. } => *id,
        }
    }

    pub fn span(&self) -> Span {
        match *self {
            BusyRecord::NormalBooking {
                start,
                duration_minutes,
                ..
            } => Span::starting_at(start, duration_minutes),
            BusyRecord::BlockWindow { start, end, .. } => Span::new(start, end),
        }
    }
}

// ── Routes ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    Low,
    Moderate,
    Heavy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub distance_km: f64,
    pub duration_min: u32,
    pub traffic: TrafficLevel,
    pub toll: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteCacheEntry {
    pub route: RouteInfo,
    pub computed_at: DateTime<Utc>,
}

// ── Pricing ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Transfer,
    Airport,
    Hourly,
    Event,
}

impl FromStr for ServiceType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transfer" => Ok(ServiceType::Transfer),
            "airport" => Ok(ServiceType::Airport),
            "hourly" | "disposal" => Ok(ServiceType::Hourly),
            "event" | "ceremony" => Ok(ServiceType::Event),
            _ => Err(ParseError::Service(s.to_string())),
        }
    }
}

/// The date-independent inputs a booking was priced from. Date and start
/// time come from the record, so a move reprices it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingInput {
    Distance {
        distance_km: f64,
        service: ServiceType,
        stop_count: u32,
        has_pets: bool,
    },
    Tier {
        hours: u32,
        hourly_rate: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_fare: f64,
    pub distance_fare: f64,
    pub night_surcharge: f64,
    pub stop_fee: f64,
    pub pet_fee: f64,
    pub service_multiplier: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub breakdown: PriceBreakdown,
    pub duration_minutes: u32,
    pub route: Option<RouteInfo>,
}

// ── WAL records ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    RecordInserted { record: BookingRecord },
    RecordUpdated { record: BookingRecord },
}

impl Event {
    pub fn record(&self) -> &BookingRecord {
        match self {
            Event::RecordInserted { record } | Event::RecordUpdated { record } => record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 24).unwrap()
    }

    fn record(kind: RecordKind, status: BookingStatus) -> BookingRecord {
        NewBooking {
            date: day(),
            start_time: TimeOfDay::from_hm(14, 0).unwrap(),
            kind,
            status,
            pricing: None,
            price: None,
            label: None,
        }
        .with_id(Ulid::new())
    }

    #[test]
    fn time_of_day_parse_and_display() {
        let t: TimeOfDay = "09:30".parse().unwrap();
        assert_eq!(t.to_string(), "09:30");
        assert_eq!(t.minutes(), 570);
        assert_eq!("7:05".parse::<TimeOfDay>().unwrap().to_string(), "07:05");
    }

    #[test]
    fn time_of_day_sentinel_normalizes() {
        let t: TimeOfDay = "24:00".parse().unwrap();
        assert_eq!(t, TimeOfDay::midnight());
        assert_eq!(TimeOfDay::from_minutes(1440), Some(TimeOfDay::midnight()));
    }

    #[test]
    fn time_of_day_rejects_garbage() {
        for bad in ["", "9", "25:00", "24:30", "12:60", "12:5", "ab:cd", "12:00:00"] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "{bad} should not parse");
        }
        assert_eq!(TimeOfDay::from_minutes(-1), None);
        assert_eq!(TimeOfDay::from_minutes(1441), None);
    }

    #[test]
    fn time_of_day_json() {
        let t = TimeOfDay::from_hm(6, 30).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"06:30\"");
        let back: TimeOfDay = serde_json::from_str("\"06:30\"").unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn span_overlap_half_open() {
        let d = day();
        let a = Span::new(at(d, 9, 0), at(d, 10, 0));
        let adjacent = Span::new(at(d, 10, 0), at(d, 11, 0));
        let early = Span::new(at(d, 9, 59), at(d, 11, 0));
        assert!(!a.overlaps(&adjacent));
        assert!(!adjacent.overlaps(&a));
        assert!(a.overlaps(&early));
        assert!(early.overlaps(&a));
    }

    #[test]
    fn span_dates_crossing_midnight() {
        let d = day();
        let s = Span::starting_at(at(d, 23, 0), 120);
        assert_eq!(s.dates(), vec![d, d.succ_opt().unwrap()]);
        // Ending exactly at midnight does not occupy the next day.
        let s = Span::starting_at(at(d, 23, 0), 60);
        assert_eq!(s.dates(), vec![d]);
    }

    #[test]
    fn booking_span_uses_duration() {
        let r = record(RecordKind::Booking { duration_minutes: 90 }, BookingStatus::Confirmed);
        assert_eq!(r.span(), Span::new(at(day(), 14, 0), at(day(), 15, 30)));
        assert!(!r.is_block());
    }

    #[test]
    fn block_span_uses_explicit_end() {
        let end = TimeOfDay::from_hm(18, 0).unwrap();
        let r = record(RecordKind::Block { end }, BookingStatus::Confirmed);
        assert!(r.is_block());
        assert_eq!(r.span(), Span::new(at(day(), 14, 0), at(day(), 18, 0)));
        match r.busy().unwrap() {
            BusyRecord::BlockWindow { end, .. } => assert_eq!(end, at(day(), 18, 0)),
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn block_end_before_start_wraps() {
        let end = TimeOfDay::from_hm(2, 0).unwrap();
        let r = record(RecordKind::Block { end }, BookingStatus::Confirmed);
        let next = day().succ_opt().unwrap();
        assert_eq!(r.span().end, at(next, 2, 0));
        assert_eq!(r.span().duration_minutes(), 12 * 60);
    }

    #[test]
    fn non_busy_statuses_have_no_busy_view() {
        let kind = RecordKind::Booking { duration_minutes: 60 };
        assert!(record(kind, BookingStatus::Cancelled).busy().is_none());
        assert!(record(kind, BookingStatus::Declined).busy().is_none());
        assert!(record(kind, BookingStatus::Executed).busy().is_some());
        assert!(record(kind, BookingStatus::Requested).busy().is_some());
    }

    #[test]
    fn status_transitions() {
        use BookingStatus::*;
        assert!(Requested.can_transition_to(Confirmed));
        assert!(Proposed.can_transition_to(Declined));
        assert!(Confirmed.can_transition_to(Executed));
        assert!(Rescheduled.can_transition_to(Confirmed));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Declined.can_transition_to(Requested));
        assert!(!Executed.can_transition_to(Cancelled));
        assert!(!Confirmed.can_transition_to(Requested));
        assert!(Confirmed.can_reschedule());
        assert!(!Cancelled.can_reschedule());
    }

    #[test]
    fn status_parse() {
        assert_eq!("Confirmed".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
        assert_eq!("canceled".parse::<BookingStatus>().unwrap(), BookingStatus::Cancelled);
        assert!("pending".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn hours_take_precedence_over_duration() {
        assert_eq!(derive_duration_minutes(Some(3), Some(45)), Some(180));
        assert_eq!(derive_duration_minutes(None, Some(45)), Some(45));
        assert_eq!(derive_duration_minutes(None, None), None);
    }

    #[test]
    fn service_type_parse() {
        assert_eq!("EVENT".parse::<ServiceType>().unwrap(), ServiceType::Event);
        assert_eq!("disposal".parse::<ServiceType>().unwrap(), ServiceType::Hourly);
        assert!("helicopter".parse::<ServiceType>().is_err());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::RecordInserted {
            record: record(
                RecordKind::Block { end: TimeOfDay::from_hm(16, 0).unwrap() },
                BookingStatus::Confirmed,
            ),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
