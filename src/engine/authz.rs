use crate::model::*;

use super::EngineError;

/// Owners and admins may touch a reservation; everyone else is denied.
pub fn authorize_mutation(reservation: &Reservation, actor: &Actor) -> Result<(), EngineError> {
    if actor.id == reservation.user_id || actor.is_admin() {
        Ok(())
    } else {
        Err(EngineError::Denied("you can only modify your own reservations"))
    }
}

/// Status state machine: anything → `Cancelled` by owner or admin; every
/// other target status is admin-only; nothing leaves `Cancelled`.
///
/// Ownership itself is `authorize_mutation`'s job — call that first.
pub fn authorize_status_change(
    reservation: &Reservation,
    to: ReservationStatus,
    actor: &Actor,
) -> Result<(), EngineError> {
    if reservation.status.is_terminal() {
        return Err(EngineError::AlreadyCancelled(reservation.id));
    }
    match to {
        ReservationStatus::Cancelled => Ok(()),
        _ if actor.is_admin() => Ok(()),
        _ => Err(EngineError::Denied("only admins may set reservation status")),
    }
}
