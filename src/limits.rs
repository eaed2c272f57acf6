//! Hard limits. Everything here is a guard against pathological input, not a
//! tuning knob.

use crate::model::Ms;

/// Earliest timestamp a reservation may carry (1970-01-01).
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// Latest timestamp a reservation may carry (~year 2100).
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Widest single reservation: 30 days.
pub const MAX_SPAN_DURATION_MS: Ms = 30 * 24 * 3_600_000;

/// Widest schedule/free-slot query window: 366 days.
pub const MAX_QUERY_WINDOW_MS: Ms = 366 * 24 * 3_600_000;

pub const MAX_ROOMS: usize = 10_000;

pub const MAX_RESERVATIONS_PER_ROOM: usize = 100_000;

/// Matches the catalog column width of the upstream schema.
pub const MAX_NAME_LEN: usize = 100;

pub const MAX_PURPOSE_LEN: usize = 255;
