//! Pure winner resolution.
//!
//! Ties on distance go to the lowest seat index. When no active player
//! submitted an estimate the pot is split evenly between the active
//! players, odd chips going one each to the lowest seats.

use super::entities::{Chips, Outcome, RoomPlayer, SeatIndex};

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub outcome: Outcome,
    /// `(seat, chips)` paid out of the pot, in seat order.
    pub shares: Vec<(SeatIndex, Chips)>,
    /// `(seat, distance)` for every seated player, `None` without an estimate.
    pub distances: Vec<(SeatIndex, Option<f64>)>,
}

#[must_use]
pub fn distance(estimate: f64, answer: f64) -> f64 {
    (estimate - answer).abs()
}

/// Active seat whose estimate is closest to `answer`.
#[must_use]
pub fn closest_seat(players: &[RoomPlayer], answer: f64) -> Option<SeatIndex> {
    let mut best: Option<(SeatIndex, f64)> = None;
    for player in players.iter().filter(|p| p.is_active()) {
        let Some(estimate) = player.estimate else {
            continue;
        };
        let d = distance(estimate, answer);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((player.seat, d)),
        }
    }
    best.map(|(seat, _)| seat)
}

/// Split `pot` evenly across `seats`.
#[must_use]
pub fn split_pot(pot: Chips, seats: &[SeatIndex]) -> Vec<(SeatIndex, Chips)> {
    if seats.is_empty() {
        return vec![];
    }

    let mut ordered = seats.to_vec();
    ordered.sort_unstable();

    let count = ordered.len() as Chips;
    let share = pot / count;
    let remainder = (pot % count) as usize;

    ordered
        .into_iter()
        .enumerate()
        .map(|(idx, seat)| (seat, share + Chips::from(idx < remainder)))
        .collect()
}

/// Decide who takes `pot`. `players` must be in seat order.
#[must_use]
pub fn resolve(players: &[RoomPlayer], answer: f64, pot: Chips) -> Resolution {
    let distances = players
        .iter()
        .map(|p| (p.seat, p.estimate.map(|e| distance(e, answer))))
        .collect();

    let active: Vec<SeatIndex> = players
        .iter()
        .filter(|p| p.is_active())
        .map(|p| p.seat)
        .collect();

    if let [seat] = active.as_slice() {
        return Resolution {
            outcome: Outcome::LastStanding,
            shares: vec![(*seat, pot)],
            distances,
        };
    }

    match closest_seat(players, answer) {
        Some(seat) => Resolution {
            outcome: Outcome::Closest,
            shares: vec![(seat, pot)],
            distances,
        },
        None => Resolution {
            outcome: Outcome::NoEstimates,
            shares: split_pot(pot, &active),
            distances,
        },
    }
}
