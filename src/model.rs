use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// What a room is furnished as. Catalog metadata — no booking rule depends
/// on the kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    #[default]
    Meeting,
    Conference,
    Training,
    Office,
    BreakRoom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    /// Cancelled reservations never leave that state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// A verified caller identity. Token verification happens upstream; by the
/// time an `Actor` reaches the engine its role is already trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Ulid,
    pub role: Role,
}

impl Actor {
    pub fn user(id: Ulid) -> Self {
        Self { id, role: Role::User }
    }

    pub fn admin(id: Ulid) -> Self {
        Self { id, role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A single reservation on a room. Cancelled reservations stay in the ledger
/// (soft delete) and are skipped by conflict checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub room_id: Ulid,
    pub user_id: Ulid,
    pub span: Span,
    pub purpose: Option<String>,
    pub status: ReservationStatus,
}

impl Reservation {
    /// Active = occupies its slot for conflict purposes.
    pub fn is_active(&self) -> bool {
        self.status != ReservationStatus::Cancelled
    }
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    /// Unique across the engine.
    pub name: String,
    pub capacity: u32,
    pub floor: i32,
    pub kind: RoomKind,
    /// Gate for new admissions only — existing reservations are untouched
    /// when this flips off.
    pub available: bool,
    /// Every reservation ever made on this room, sorted by `span.start`.
    pub reservations: Vec<Reservation>,
}

impl RoomState {
    pub fn new(
        id: Ulid,
        name: String,
        capacity: u32,
        floor: i32,
        kind: RoomKind,
        available: bool,
    ) -> Self {
        Self {
            id,
            name,
            capacity,
            floor,
            kind,
            available,
            reservations: Vec::new(),
        }
    }

    /// Insert a reservation maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    /// Remove a reservation by id. Only used when a span moves (remove +
    /// reinsert keeps the sort order); cancellation flips status in place.
    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        if let Some(pos) = self.reservations.iter().position(|r| r.id == id) {
            Some(self.reservations.remove(pos))
        } else {
            None
        }
    }

    pub fn get_reservation(&self, id: Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn get_reservation_mut(&mut self, id: Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    /// Return only reservations whose span overlaps the query window,
    /// regardless of status. Uses binary search to skip reservations starting
    /// at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }
}

/// The event types — flat, no nesting. This is the WAL record format and the
/// notify payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        name: String,
        capacity: u32,
        floor: i32,
        kind: RoomKind,
        available: bool,
    },
    RoomUpdated {
        id: Ulid,
        name: String,
        capacity: u32,
        floor: i32,
        kind: RoomKind,
        available: bool,
    },
    RoomDeleted {
        id: Ulid,
    },
    ReservationCreated {
        id: Ulid,
        room_id: Ulid,
        user_id: Ulid,
        span: Span,
        purpose: Option<String>,
        status: ReservationStatus,
    },
    /// Full post-update image; replay applies it verbatim.
    ReservationUpdated {
        id: Ulid,
        room_id: Ulid,
        span: Span,
        purpose: Option<String>,
        status: ReservationStatus,
    },
    ReservationCancelled {
        id: Ulid,
        room_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomInfo {
    pub id: Ulid,
    pub name: String,
    pub capacity: u32,
    pub floor: i32,
    pub kind: RoomKind,
    pub available: bool,
}

impl RoomInfo {
    pub(crate) fn from_state(rs: &RoomState) -> Self {
        Self {
            id: rs.id,
            name: rs.name.clone(),
            capacity: rs.capacity,
            floor: rs.floor,
            kind: rs.kind,
            available: rs.available,
        }
    }
}

/// Catalog listing entry: room plus its reservation tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub room: RoomInfo,
    /// Every reservation ever made, cancelled included.
    pub total_reservations: usize,
    /// Confirmed reservations that start in the future.
    pub upcoming_confirmed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationInfo {
    pub id: Ulid,
    pub room_id: Ulid,
    pub user_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub purpose: Option<String>,
    pub status: ReservationStatus,
}

impl ReservationInfo {
    pub(crate) fn from_reservation(r: &Reservation) -> Self {
        Self {
            id: r.id,
            room_id: r.room_id,
            user_id: r.user_id,
            start: r.span.start,
            end: r.span.end,
            purpose: r.purpose.clone(),
            status: r.status,
        }
    }
}

// ── Mutation inputs ──────────────────────────────────────────────

/// Partial room update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct RoomPatch {
    pub name: Option<String>,
    pub capacity: Option<u32>,
    pub floor: Option<i32>,
    pub kind: Option<RoomKind>,
    pub available: Option<bool>,
}

/// Partial reservation update; `None` leaves the field unchanged. `times`
/// re-runs conflict checking; `status` is admin-gated unless the target is
/// `Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct ReservationPatch {
    pub times: Option<(Ms, Ms)>,
    pub purpose: Option<Option<String>>,
    pub status: Option<ReservationStatus>,
}
