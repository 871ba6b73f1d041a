use crate::limits::*;
use crate::model::*;

use super::ArbiterError;

/// First busy record overlapping `span`, ignoring `exclude` (the record's own
/// prior state when it is being moved).
pub fn find_conflict(
    span: &Span,
    busy: &[BusyRecord],
    exclude: Option<RecordId>,
) -> Option<RecordId> {
    busy.iter()
        .filter(|b| Some(b.id()) != exclude)
        .find(|b| b.span().overlaps(span))
        .map(BusyRecord::id)
}

pub fn has_conflict(span: &Span, busy: &[BusyRecord], exclude: Option<RecordId>) -> bool {
    find_conflict(span, busy, exclude).is_some()
}

pub(crate) fn check_no_conflict(
    span: &Span,
    busy: &[BusyRecord],
    exclude: Option<RecordId>,
) -> Result<(), ArbiterError> {
    match find_conflict(span, busy, exclude) {
        Some(id) => Err(ArbiterError::Conflict(id)),
        None => Ok(()),
    }
}

// ── Input validation ─────────────────────────────────────────────

pub(crate) fn validate_duration(minutes: u32) -> Result<(), ArbiterError> {
    if minutes == 0 {
        return Err(ArbiterError::InvalidInput("duration must be at least one minute".into()));
    }
    if minutes > MAX_DURATION_MINUTES {
        return Err(ArbiterError::LimitExceeded("duration too long"));
    }
    Ok(())
}

pub(crate) fn validate_kind(kind: &RecordKind) -> Result<(), ArbiterError> {
    match kind {
        RecordKind::Booking { duration_minutes } => validate_duration(*duration_minutes),
        // A block's end is always within a day of its start.
        RecordKind::Block { .. } => Ok(()),
    }
}

pub(crate) fn validate_label(label: Option<&str>) -> Result<(), ArbiterError> {
    if label.is_some_and(|l| l.len() > MAX_LABEL_LEN) {
        return Err(ArbiterError::LimitExceeded("label too long"));
    }
    Ok(())
}

pub(crate) fn validate_address(name: &str, value: &str) -> Result<(), ArbiterError> {
    if value.trim().is_empty() {
        return Err(ArbiterError::InvalidInput(format!("{name} must not be empty")));
    }
    if value.len() > MAX_ADDRESS_LEN {
        return Err(ArbiterError::LimitExceeded("address too long"));
    }
    Ok(())
}
