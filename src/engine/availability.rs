use chrono::NaiveDate;

use crate::model::*;

use super::slots::{WeeklyTemplate, generate_slots};

// ── Availability Algorithm ────────────────────────────────────────

/// Start times on `date` whose `[slot, slot + duration)` interval overlaps no
/// busy record. Busy records from neighbouring days are honoured when their
/// intervals spill into the candidate windows.
pub fn resolve_free_slots(
    date: NaiveDate,
    duration_minutes: u32,
    busy: &[BusyRecord],
    template: &WeeklyTemplate,
) -> Vec<TimeOfDay> {
    let mut spans: Vec<Span> = busy.iter().map(BusyRecord::span).collect();
    spans.sort_by_key(|s| s.start);
    let blocked = merge_overlapping(&spans);

    generate_slots(date, template)
        .into_iter()
        .filter(|slot| {
            let candidate = Span::starting_at(slot.on(date), duration_minutes);
            !overlaps_any(&blocked, &candidate)
        })
        .collect()
}

/// Busy views of the records that still occupy time.
pub fn busy_records<'a, I>(records: I) -> Vec<BusyRecord>
where
    I: IntoIterator<Item = &'a BookingRecord>,
{
    records.into_iter().filter_map(BookingRecord::busy).collect()
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `disjoint` must be sorted and non-overlapping.
fn overlaps_any(disjoint: &[Span], query: &Span) -> bool {
    // Everything at index >= right_bound starts at or after query.end.
    let right_bound = disjoint.partition_point(|s| s.start < query.end);
    disjoint[..right_bound]
        .last()
        .is_some_and(|s| s.end > query.start)
}
