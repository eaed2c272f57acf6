use ulid::Ulid;

/// Per-request failures. Nothing here is fatal to the process; the embedding
/// HTTP layer maps variants to status codes (validation → 400, `Denied` → 403,
/// `NotFound` → 404, `SlotTaken`/`NameTaken`/`RoomInUse`/`AlreadyCancelled` →
/// 409, `WalError` → 500).
#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Room names are unique across the catalog.
    NameTaken(String),
    /// Room still has confirmed reservations ending in the future.
    RoomInUse(Ulid),
    /// The room's availability flag is off; no new admissions.
    RoomUnavailable(Ulid),
    /// start >= end.
    InvalidInterval,
    /// start is before the admission clock.
    PastBooking,
    /// The slot overlaps the given active reservation.
    SlotTaken(Ulid),
    /// Cancelled is terminal; no mutation touches the reservation again.
    AlreadyCancelled(Ulid),
    Denied(&'static str),
    /// An update patch with every field unset.
    EmptyUpdate,
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::NameTaken(name) => write!(f, "room name already exists: {name}"),
            EngineError::RoomInUse(id) => {
                write!(f, "cannot delete room {id}: active reservations remain")
            }
            EngineError::RoomUnavailable(id) => write!(f, "room {id} is not available"),
            EngineError::InvalidInterval => write!(f, "end time must be after start time"),
            EngineError::PastBooking => write!(f, "cannot book in the past"),
            EngineError::SlotTaken(id) => {
                write!(f, "slot already booked by reservation: {id}")
            }
            EngineError::AlreadyCancelled(id) => {
                write!(f, "reservation {id} is cancelled and cannot change")
            }
            EngineError::Denied(msg) => write!(f, "denied: {msg}"),
            EngineError::EmptyUpdate => write!(f, "no fields to update"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
