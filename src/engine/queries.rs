use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{conflicting_reservation, now_ms};
use super::slots;
use super::{Engine, EngineError};

fn validate_window(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if start >= end {
        return Err(EngineError::InvalidInterval);
    }
    if end - start > MAX_QUERY_WINDOW_MS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(Span::new(start, end))
}

impl Engine {
    pub async fn room(&self, id: Ulid) -> Result<RoomInfo, EngineError> {
        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.read().await;
        Ok(RoomInfo::from_state(&guard))
    }

    /// Catalog listing sorted by name, with per-room reservation tallies.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let now = now_ms();
        let ids: Vec<Ulid> = self.rooms.iter().map(|e| *e.key()).collect();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(rs) = self.get_room(&id) else { continue };
            let guard = rs.read().await;
            let upcoming_confirmed = guard
                .reservations
                .iter()
                .filter(|r| r.status == ReservationStatus::Confirmed && r.span.start > now)
                .count();
            out.push(RoomSummary {
                room: RoomInfo::from_state(&guard),
                total_reservations: guard.reservations.len(),
                upcoming_confirmed,
            });
        }
        out.sort_by(|a, b| a.room.name.cmp(&b.room.name));
        out
    }

    pub async fn reservation(&self, id: Ulid) -> Result<ReservationInfo, EngineError> {
        let room_id = self
            .room_id_for_reservation(&id)
            .ok_or(EngineError::NotFound(id))?;
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.read().await;
        let r = guard.get_reservation(id).ok_or(EngineError::NotFound(id))?;
        Ok(ReservationInfo::from_reservation(r))
    }

    /// Active (non-cancelled) reservations on a room, ascending by start.
    /// Unknown rooms yield an empty list.
    pub async fn reservations_for_room(&self, room_id: Ulid) -> Vec<ReservationInfo> {
        let Some(rs) = self.get_room(&room_id) else {
            return Vec::new();
        };
        let guard = rs.read().await;
        guard
            .reservations
            .iter()
            .filter(|r| r.is_active())
            .map(ReservationInfo::from_reservation)
            .collect()
    }

    /// Everything a user ever booked, cancelled included, newest start first.
    pub async fn reservations_for_user(&self, user_id: Ulid) -> Vec<ReservationInfo> {
        let mut out = Vec::new();
        let ids: Vec<Ulid> = self.rooms.iter().map(|e| *e.key()).collect();
        for id in ids {
            let Some(rs) = self.get_room(&id) else { continue };
            let guard = rs.read().await;
            out.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| r.user_id == user_id)
                    .map(ReservationInfo::from_reservation),
            );
        }
        out.sort_by(|a, b| b.start.cmp(&a.start));
        out
    }

    /// Every reservation in the system, newest start first. Admin only.
    pub async fn all_reservations(&self, actor: Actor) -> Result<Vec<ReservationInfo>, EngineError> {
        if !actor.is_admin() {
            return Err(EngineError::Denied("admin access required"));
        }
        let mut out = Vec::new();
        let ids: Vec<Ulid> = self.rooms.iter().map(|e| *e.key()).collect();
        for id in ids {
            let Some(rs) = self.get_room(&id) else { continue };
            let guard = rs.read().await;
            out.extend(guard.reservations.iter().map(ReservationInfo::from_reservation));
        }
        out.sort_by(|a, b| b.start.cmp(&a.start));
        Ok(out)
    }

    /// Active reservations overlapping a window, ascending by start.
    /// Unknown rooms yield an empty list.
    pub async fn room_schedule(
        &self,
        room_id: Ulid,
        window_start: Ms,
        window_end: Ms,
    ) -> Result<Vec<ReservationInfo>, EngineError> {
        let window = validate_window(window_start, window_end)?;
        let Some(rs) = self.get_room(&room_id) else {
            return Ok(Vec::new());
        };
        let guard = rs.read().await;
        Ok(guard
            .overlapping(&window)
            .filter(|r| r.is_active())
            .map(ReservationInfo::from_reservation)
            .collect())
    }

    /// Bookable gaps in a window: the window minus active reservation spans.
    /// Empty for unknown or unavailable rooms.
    pub async fn free_slots(
        &self,
        room_id: Ulid,
        window_start: Ms,
        window_end: Ms,
    ) -> Result<Vec<Span>, EngineError> {
        let window = validate_window(window_start, window_end)?;
        let Some(rs) = self.get_room(&room_id) else {
            return Ok(Vec::new());
        };
        let guard = rs.read().await;
        Ok(slots::free_slots(&guard, &window))
    }

    /// Would `[start, end)` collide with an active reservation on the room?
    /// `exclude` skips one reservation id (update-in-place checks). Read-only
    /// — admission itself re-checks under the write lock.
    pub async fn has_conflict(
        &self,
        room_id: Ulid,
        start: Ms,
        end: Ms,
        exclude: Option<Ulid>,
    ) -> Result<bool, EngineError> {
        if start >= end {
            return Err(EngineError::InvalidInterval);
        }
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.read().await;
        Ok(conflicting_reservation(&guard, &Span::new(start, end), exclude).is_some())
    }
}
