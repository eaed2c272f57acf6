mod admission;
mod authz;
mod conflict;
mod error;
mod mutations;
mod queries;
mod slots;

pub use admission::admit;
pub use authz::{authorize_mutation, authorize_status_change};
pub use conflict::conflicting_reservation;
pub use error::EngineError;
pub use slots::{free_slots, merge_overlapping, subtract_spans};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit:
/// block until an Append arrives, drain everything immediately queued behind
/// it, write the whole batch with a single fsync, then answer every sender.
/// A non-append command stops the drain so compaction always sees a fully
/// flushed log.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };

        let mut batch = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }

        metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());

        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    match append_err.or(flush_err) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

pub struct Engine {
    pub(super) rooms: DashMap<Ulid, SharedRoomState>,
    /// Reverse lookup: reservation id → room id.
    pub(super) reservation_to_room: DashMap<Ulid, Ulid>,
    /// Unique-name index for the catalog.
    pub(super) room_names: DashMap<String, Ulid>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

/// Apply an event directly to a RoomState (no locking — caller holds the
/// lock). Room create/delete and the name index are engine-level concerns
/// handled by the caller.
fn apply_to_room(rs: &mut RoomState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::ReservationCreated {
            id,
            room_id,
            user_id,
            span,
            purpose,
            status,
        } => {
            rs.insert_reservation(Reservation {
                id: *id,
                room_id: *room_id,
                user_id: *user_id,
                span: *span,
                purpose: purpose.clone(),
                status: *status,
            });
            index.insert(*id, *room_id);
        }
        Event::ReservationUpdated {
            id,
            room_id,
            span,
            purpose,
            status,
        } => {
            // Remove + reinsert keeps the span.start sort order.
            if let Some(old) = rs.remove_reservation(*id) {
                rs.insert_reservation(Reservation {
                    id: *id,
                    room_id: *room_id,
                    user_id: old.user_id,
                    span: *span,
                    purpose: purpose.clone(),
                    status: *status,
                });
            }
        }
        Event::ReservationCancelled { id, .. } => {
            // Soft delete: the record stays in the ledger.
            if let Some(r) = rs.get_reservation_mut(*id) {
                r.status = ReservationStatus::Cancelled;
            }
        }
        Event::RoomUpdated {
            name,
            capacity,
            floor,
            kind,
            available,
            ..
        } => {
            rs.name = name.clone();
            rs.capacity = *capacity;
            rs.floor = *floor;
            rs.kind = *kind;
            rs.available = *available;
        }
        Event::RoomCreated { .. } | Event::RoomDeleted { .. } => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            rooms: DashMap::new(),
            reservation_to_room: DashMap::new(),
            room_names: DashMap::new(),
            wal_tx,
            notify,
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly. Never use blocking_write here because
        // this may run inside an async context.
        for event in &events {
            match event {
                Event::RoomCreated {
                    id,
                    name,
                    capacity,
                    floor,
                    kind,
                    available,
                } => {
                    let rs = RoomState::new(*id, name.clone(), *capacity, *floor, *kind, *available);
                    engine.room_names.insert(name.clone(), *id);
                    engine.rooms.insert(*id, Arc::new(RwLock::new(rs)));
                }
                Event::RoomDeleted { id } => {
                    if let Some((_, rs)) = engine.rooms.remove(id) {
                        let guard = rs.try_read().expect("replay: uncontended read");
                        engine.room_names.remove(&guard.name);
                        for r in &guard.reservations {
                            engine.reservation_to_room.remove(&r.id);
                        }
                    }
                }
                other => {
                    let room_id = event_room_id(other);
                    if let Some(room_id) = room_id
                        && let Some(entry) = engine.rooms.get(&room_id) {
                            let rs_arc = entry.clone();
                            let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                            if let Event::RoomUpdated { name, .. } = other
                                && *name != guard.name {
                                    engine.room_names.remove(&guard.name);
                                    engine.room_names.insert(name.clone(), room_id);
                                }
                            apply_to_room(&mut guard, other, &engine.reservation_to_room);
                        }
                }
            }
        }

        let mut active = 0usize;
        for entry in engine.rooms.iter() {
            let guard = entry.value().try_read().expect("replay: uncontended read");
            active += guard.reservations.iter().filter(|r| r.is_active()).count();
        }
        metrics::gauge!(observability::ROOMS).set(engine.rooms.len() as f64);
        metrics::gauge!(observability::RESERVATIONS_ACTIVE).set(active as f64);

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn room_id_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_room
            .get(reservation_id)
            .map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call — the commit tail of every
    /// reservation mutation.
    pub(super) async fn persist_and_apply(
        &self,
        room_id: Ulid,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.reservation_to_room);
        self.notify.send(room_id, event);
        Ok(())
    }

    /// Lookup reservation → room, get room, acquire write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .room_id_for_reservation(reservation_id)
            .ok_or(EngineError::NotFound(*reservation_id))?;
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let guard = rs.write_owned().await;
        Ok((room_id, guard))
    }
}

/// Extract the room_id from an event (for non-room-create/delete events).
fn event_room_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::ReservationCreated { room_id, .. }
        | Event::ReservationUpdated { room_id, .. }
        | Event::ReservationCancelled { room_id, .. } => Some(*room_id),
        Event::RoomUpdated { id, .. } => Some(*id),
        Event::RoomCreated { .. } | Event::RoomDeleted { .. } => None,
    }
}
