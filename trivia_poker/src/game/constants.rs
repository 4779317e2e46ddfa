//! Table limits and defaults.

use super::entities::Chips;

/// Fewest seated players a room needs before a game can start.
pub const MIN_SEATS: usize = 2;

/// Most players a single room can seat.
pub const MAX_SEATS: usize = 6;

/// Seat that posts the small blind every round.
pub const SMALL_BLIND_SEAT: usize = 0;

/// Seat that posts the big blind every round.
pub const BIG_BLIND_SEAT: usize = 1;

pub const DEFAULT_SMALL_BLIND: Chips = 5;
pub const DEFAULT_BIG_BLIND: Chips = 10;
pub const DEFAULT_STARTING_STAKE: Chips = 500;

/// Seconds players get to submit an estimate before betting opens.
pub const DEFAULT_COUNTDOWN_SECS: u64 = 60;

pub const MAX_USERNAME_LENGTH: usize = 32;
