use std::sync::Arc;

use tokio::sync::{RwLock, oneshot};
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::admission::admit;
use super::authz::{authorize_mutation, authorize_status_change};
use super::conflict::{check_no_conflict, now_ms, validate_span};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    // ── Room catalog ─────────────────────────────────────────

    /// Add a room to the catalog. Admin only; names are unique. New rooms
    /// start available.
    pub async fn create_room(
        &self,
        actor: Actor,
        id: Ulid,
        name: String,
        capacity: u32,
        floor: i32,
        kind: RoomKind,
    ) -> Result<(), EngineError> {
        if !actor.is_admin() {
            return Err(EngineError::Denied("admin access required"));
        }
        if self.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("room name empty or too long"));
        }
        if capacity == 0 {
            return Err(EngineError::LimitExceeded("room capacity must be at least 1"));
        }
        if self.rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.room_names.contains_key(&name) {
            return Err(EngineError::NameTaken(name));
        }

        let available = true;
        let event = Event::RoomCreated {
            id,
            name: name.clone(),
            capacity,
            floor,
            kind,
            available,
        };
        self.wal_append(&event).await?;
        let rs = RoomState::new(id, name.clone(), capacity, floor, kind, available);
        self.rooms.insert(id, Arc::new(RwLock::new(rs)));
        self.room_names.insert(name.clone(), id);
        self.notify.send(id, &event);
        metrics::gauge!(observability::ROOMS).increment(1.0);
        info!(%id, %name, "room created");
        Ok(())
    }

    /// Patch a room. Admin only. Flipping `available` off stops new
    /// admissions but never touches existing reservations.
    pub async fn update_room(
        &self,
        actor: Actor,
        id: Ulid,
        patch: RoomPatch,
    ) -> Result<RoomInfo, EngineError> {
        if !actor.is_admin() {
            return Err(EngineError::Denied("admin access required"));
        }
        if let Some(ref name) = patch.name
            && (name.is_empty() || name.len() > MAX_NAME_LEN) {
                return Err(EngineError::LimitExceeded("room name empty or too long"));
            }
        if patch.capacity == Some(0) {
            return Err(EngineError::LimitExceeded("room capacity must be at least 1"));
        }

        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;

        let old_name = guard.name.clone();
        let name = patch.name.unwrap_or_else(|| old_name.clone());
        if name != old_name
            && let Some(other) = self.room_names.get(&name)
            && *other.value() != id {
                return Err(EngineError::NameTaken(name));
            }

        let event = Event::RoomUpdated {
            id,
            name: name.clone(),
            capacity: patch.capacity.unwrap_or(guard.capacity),
            floor: patch.floor.unwrap_or(guard.floor),
            kind: patch.kind.unwrap_or(guard.kind),
            available: patch.available.unwrap_or(guard.available),
        };
        self.persist_and_apply(id, &mut guard, &event).await?;
        if name != old_name {
            self.room_names.remove(&old_name);
            self.room_names.insert(name, id);
        }
        Ok(RoomInfo::from_state(&guard))
    }

    /// Remove a room and its reservation ledger. Admin only; refused while
    /// confirmed reservations still end in the future.
    pub async fn delete_room(&self, actor: Actor, id: Ulid) -> Result<(), EngineError> {
        if !actor.is_admin() {
            return Err(EngineError::Denied("admin access required"));
        }
        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.read().await;
        let now = now_ms();
        let in_use = guard
            .reservations
            .iter()
            .any(|r| r.status == ReservationStatus::Confirmed && r.span.end > now);
        if in_use {
            return Err(EngineError::RoomInUse(id));
        }
        let name = guard.name.clone();
        let reservation_ids: Vec<Ulid> = guard.reservations.iter().map(|r| r.id).collect();
        drop(guard);

        let event = Event::RoomDeleted { id };
        self.wal_append(&event).await?;
        self.rooms.remove(&id);
        self.room_names.remove(&name);
        for rid in reservation_ids {
            self.reservation_to_room.remove(&rid);
        }
        self.notify.send(id, &event);
        self.notify.remove(&id);
        metrics::gauge!(observability::ROOMS).decrement(1.0);
        info!(%id, %name, "room deleted");
        Ok(())
    }

    // ── Reservations ─────────────────────────────────────────

    /// Admit and record a booking for the calling user. The admission checks
    /// and the insert run under the room's write lock, so two overlapping
    /// requests cannot both pass the conflict scan.
    pub async fn create_reservation(
        &self,
        actor: Actor,
        id: Ulid,
        room_id: Ulid,
        start: Ms,
        end: Ms,
        purpose: Option<String>,
    ) -> Result<ReservationInfo, EngineError> {
        if let Some(ref p) = purpose
            && p.len() > MAX_PURPOSE_LEN {
                return Err(EngineError::LimitExceeded("purpose too long"));
            }
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let mut guard = rs.write().await;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations on room"));
        }

        if let Err(e) = admit(&guard, start, end, now_ms()) {
            if matches!(e, EngineError::SlotTaken(_)) {
                metrics::counter!(observability::CONFLICTS_TOTAL).increment(1);
            }
            return Err(e);
        }

        let event = Event::ReservationCreated {
            id,
            room_id,
            user_id: actor.id,
            span: Span::new(start, end),
            purpose,
            status: ReservationStatus::Confirmed,
        };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(observability::ADMISSIONS_TOTAL).increment(1);
        metrics::gauge!(observability::RESERVATIONS_ACTIVE).increment(1.0);
        info!(reservation = %id, room = %room_id, user = %actor.id, "reservation admitted");

        let created = guard
            .get_reservation(id)
            .expect("reservation just applied");
        Ok(ReservationInfo::from_reservation(created))
    }

    /// Patch a reservation (times, purpose, status). Owner or admin; time
    /// changes re-run the conflict check excluding this reservation's own id;
    /// status targets other than `Cancelled` are admin-only. Cancelled
    /// reservations reject every patch.
    pub async fn update_reservation(
        &self,
        actor: Actor,
        id: Ulid,
        patch: ReservationPatch,
    ) -> Result<ReservationInfo, EngineError> {
        if patch.times.is_none() && patch.purpose.is_none() && patch.status.is_none() {
            return Err(EngineError::EmptyUpdate);
        }
        if let Some(Some(ref p)) = patch.purpose
            && p.len() > MAX_PURPOSE_LEN {
                return Err(EngineError::LimitExceeded("purpose too long"));
            }

        let (room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let existing = guard
            .get_reservation(id)
            .ok_or(EngineError::NotFound(id))?
            .clone();
        authorize_mutation(&existing, &actor)?;
        if existing.status.is_terminal() {
            return Err(EngineError::AlreadyCancelled(id));
        }
        if let Some(status) = patch.status {
            authorize_status_change(&existing, status, &actor)?;
        }

        let span = match patch.times {
            Some((start, end)) => {
                if start >= end {
                    return Err(EngineError::InvalidInterval);
                }
                let span = Span::new(start, end);
                validate_span(&span)?;
                if let Err(e) = check_no_conflict(&guard, &span, Some(id)) {
                    metrics::counter!(observability::CONFLICTS_TOTAL).increment(1);
                    return Err(e);
                }
                span
            }
            None => existing.span,
        };

        let status = patch.status.unwrap_or(existing.status);
        let event = Event::ReservationUpdated {
            id,
            room_id,
            span,
            purpose: patch.purpose.unwrap_or(existing.purpose),
            status,
        };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        if status == ReservationStatus::Cancelled {
            metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
            metrics::gauge!(observability::RESERVATIONS_ACTIVE).decrement(1.0);
        }

        let updated = guard.get_reservation(id).expect("reservation just applied");
        Ok(ReservationInfo::from_reservation(updated))
    }

    /// Soft-delete: flips status to `Cancelled` and frees the slot. Owner or
    /// admin; rejected once already cancelled.
    pub async fn cancel_reservation(&self, actor: Actor, id: Ulid) -> Result<(), EngineError> {
        let (room_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let existing = guard
            .get_reservation(id)
            .ok_or(EngineError::NotFound(id))?;
        authorize_mutation(existing, &actor)?;
        if existing.status.is_terminal() {
            return Err(EngineError::AlreadyCancelled(id));
        }

        let event = Event::ReservationCancelled { id, room_id };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
        metrics::gauge!(observability::RESERVATIONS_ACTIVE).decrement(1.0);
        info!(reservation = %id, room = %room_id, "reservation cancelled");
        Ok(())
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state (one create per room, one per reservation —
    /// cancelled ones included, the ledger is history).
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        let room_ids: Vec<Ulid> = self.rooms.iter().map(|e| *e.key()).collect();

        for id in room_ids {
            let Some(rs) = self.get_room(&id) else { continue };
            let guard = rs.read().await;
            events.push(Event::RoomCreated {
                id: guard.id,
                name: guard.name.clone(),
                capacity: guard.capacity,
                floor: guard.floor,
                kind: guard.kind,
                available: guard.available,
            });
            for r in &guard.reservations {
                events.push(Event::ReservationCreated {
                    id: r.id,
                    room_id: r.room_id,
                    user_id: r.user_id,
                    span: r.span,
                    purpose: r.purpose.clone(),
                    status: r.status,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
