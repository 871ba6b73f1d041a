use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::model::{MINUTES_PER_DAY, TimeOfDay};

// ── Weekly availability template ─────────────────────────────────

/// Inclusive window of slot start times. An end of `00:00` (written `24:00`)
/// after a non-midnight start means "through midnight".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Window {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    fn hm(start: (u32, u32), end: (u32, u32)) -> Self {
        // Constants below are all valid clock times.
        let t = |(h, m)| TimeOfDay::from_hm(h, m).unwrap_or_else(TimeOfDay::midnight);
        Self::new(t(start), t(end))
    }

    /// End in minutes since midnight of the same day, `1440` for the sentinel.
    fn end_minutes(&self) -> i64 {
        if self.end == TimeOfDay::midnight() && self.start != TimeOfDay::midnight() {
            MINUTES_PER_DAY
        } else {
            self.end.minutes()
        }
    }

    pub fn contains(&self, t: TimeOfDay) -> bool {
        let m = t.minutes();
        m >= self.start.minutes() && m <= self.end_minutes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTemplate {
    pub step_minutes: u32,
    /// Offered every day.
    pub night: Window,
    pub monday: Vec<Window>,
    pub tuesday: Vec<Window>,
    pub wednesday: Vec<Window>,
    pub thursday: Vec<Window>,
    pub friday: Vec<Window>,
    pub saturday: Vec<Window>,
    pub sunday: Vec<Window>,
}

impl Default for WeeklyTemplate {
    fn default() -> Self {
        Self {
            step_minutes: 30,
            night: Window::hm((0, 0), (6, 30)),
            monday: vec![Window::hm((7, 0), (19, 0))],
            tuesday: vec![Window::hm((8, 0), (20, 0))],
            wednesday: vec![Window::hm((7, 0), (12, 0)), Window::hm((15, 0), (21, 0))],
            thursday: vec![Window::hm((8, 0), (22, 0))],
            friday: vec![Window::hm((8, 0), (24, 0))],
            saturday: vec![Window::hm((9, 0), (24, 0))],
            sunday: vec![Window::hm((10, 0), (24, 0))],
        }
    }
}

impl WeeklyTemplate {
    pub fn windows_for(&self, weekday: Weekday) -> &[Window] {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    /// Reject templates that would produce nonsense slot lists.
    pub fn validate(&self) -> Result<(), String> {
        if self.step_minutes == 0 || i64::from(self.step_minutes) > MINUTES_PER_DAY {
            return Err(format!("step_minutes must be in 1..=1440, got {}", self.step_minutes));
        }
        let all = std::iter::once(&self.night).chain(
            [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ]
            .into_iter()
            .flat_map(|d| self.windows_for(d).iter()),
        );
        for w in all {
            if w.end_minutes() < w.start.minutes() {
                return Err(format!("window {}-{} ends before it starts", w.start, w.end));
            }
        }
        Ok(())
    }
}

// ── Slot generation ──────────────────────────────────────────────

/// Theoretical bookable start times for `date`: the night window plus the
/// weekday's windows, strictly ascending with no duplicates.
///
/// A window ending at the `24:00` sentinel emits `00:00` as its last slot,
/// which collapses into the night window's first slot.
pub fn generate_slots(date: NaiveDate, template: &WeeklyTemplate) -> Vec<TimeOfDay> {
    let step = i64::from(template.step_minutes.max(1));
    let mut slots = BTreeSet::new();

    let windows = std::iter::once(&template.night).chain(template.windows_for(date.weekday()));
    for window in windows {
        let end = window.end_minutes();
        let mut m = window.start.minutes();
        while m <= end {
            if let Some(t) = TimeOfDay::from_minutes(m) {
                slots.insert(t);
            }
            m += step;
        }
    }

    slots.into_iter().collect()
}
