use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    use crate::limits::*;
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("reservation too long"));
    }
    Ok(())
}

/// First non-cancelled reservation whose span overlaps `span`, skipping
/// `exclude` (the reservation being moved, for update-in-place checks).
///
/// Overlap is the single half-open test `a.start < b.end && b.start < a.end`;
/// `RoomState::overlapping` applies it via its sorted scan, so only status
/// and exclusion are filtered here.
pub fn conflicting_reservation(
    room: &RoomState,
    span: &Span,
    exclude: Option<Ulid>,
) -> Option<Ulid> {
    room.overlapping(span)
        .filter(|r| r.is_active())
        .find(|r| Some(r.id) != exclude)
        .map(|r| r.id)
}

pub(crate) fn check_no_conflict(
    room: &RoomState,
    span: &Span,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    match conflicting_reservation(room, span, exclude) {
        Some(id) => Err(EngineError::SlotTaken(id)),
        None => Ok(()),
    }
}
