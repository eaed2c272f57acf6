use crate::model::*;

use super::EngineError;
use super::conflict::{check_no_conflict, validate_span};

/// Side-effect-free admission decision for a new booking against the current
/// room state. Checks run in order: interval shape, limits, availability
/// flag, past start, conflict. The caller performs the insert after `Ok` —
/// and must hold the room's write lock across both, otherwise two admissions
/// can race past the conflict scan.
pub fn admit(room: &RoomState, start: Ms, end: Ms, now: Ms) -> Result<(), EngineError> {
    if start >= end {
        return Err(EngineError::InvalidInterval);
    }
    let span = Span::new(start, end);
    validate_span(&span)?;
    if !room.available {
        return Err(EngineError::RoomUnavailable(room.id));
    }
    if start < now {
        return Err(EngineError::PastBooking);
    }
    check_no_conflict(room, &span, None)
}
