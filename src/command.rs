use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::engine::BookingPricing;
use crate::model::*;

#[derive(Debug, Error)]
#[error("malformed command: {0}")]
pub struct CommandError(#[from] serde_json::Error);

/// One request line: a JSON object whose `command` field selects the variant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Availability {
        date: NaiveDate,
        duration_minutes: u32,
    },
    Quote {
        origin: String,
        destination: String,
        #[serde(default)]
        stops: Vec<String>,
        date: NaiveDate,
        start_time: TimeOfDay,
        #[serde(default = "default_service", deserialize_with = "parse_str")]
        service: ServiceType,
        #[serde(default)]
        has_pets: bool,
    },
    QuoteTier {
        hours: u32,
        hourly_rate: f64,
    },
    Book {
        date: NaiveDate,
        start_time: TimeOfDay,
        #[serde(default)]
        hours: Option<u32>,
        #[serde(default)]
        duration_minutes: Option<u32>,
        #[serde(default)]
        pricing: Option<BookingPricing>,
        #[serde(default)]
        label: Option<String>,
    },
    Block {
        date: NaiveDate,
        start_time: TimeOfDay,
        end_time: TimeOfDay,
        #[serde(default)]
        label: Option<String>,
    },
    Reschedule {
        id: RecordId,
        date: NaiveDate,
        start_time: TimeOfDay,
    },
    Transition {
        id: RecordId,
        #[serde(deserialize_with = "parse_str")]
        status: BookingStatus,
    },
    Cancel {
        id: RecordId,
    },
    List {
        date: NaiveDate,
    },
    ClearRouteCache,
}

fn default_service() -> ServiceType {
    ServiceType::Transfer
}

/// Deserialize through `FromStr` so aliases and case folding apply.
fn parse_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    Ok(serde_json::from_str(line)?)
}
