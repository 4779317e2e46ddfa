//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::entities::{Chips, PlayerId, RoomId};

/// One signed chip movement for a player in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub round_number: u32,
    /// Negative for debits.
    pub amount: i64,
    pub balance_after: Chips,
    pub direction: EntryDirection,
    pub entry_type: EntryType,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn credit(
        room_id: RoomId,
        player_id: PlayerId,
        round_number: u32,
        amount: Chips,
        balance_after: Chips,
        entry_type: EntryType,
        idempotency_key: String,
    ) -> Self {
        Self {
            room_id,
            player_id,
            round_number,
            amount: i64::from(amount),
            balance_after,
            direction: EntryDirection::Credit,
            entry_type,
            idempotency_key,
            created_at: Utc::now(),
        }
    }

    pub fn debit(
        room_id: RoomId,
        player_id: PlayerId,
        round_number: u32,
        amount: Chips,
        balance_after: Chips,
        entry_type: EntryType,
        idempotency_key: String,
    ) -> Self {
        Self {
            room_id,
            player_id,
            round_number,
            amount: -i64::from(amount),
            balance_after,
            direction: EntryDirection::Debit,
            entry_type,
            idempotency_key,
            created_at: Utc::now(),
        }
    }
}

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "debit"),
            EntryDirection::Credit => write!(f, "credit"),
        }
    }
}

/// Entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    BuyIn,
    Blind,
    Call,
    Raise,
    PotAward,
    PotSplit,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::BuyIn => write!(f, "buy_in"),
            EntryType::Blind => write!(f, "blind"),
            EntryType::Call => write!(f, "call"),
            EntryType::Raise => write!(f, "raise"),
            EntryType::PotAward => write!(f, "pot_award"),
            EntryType::PotSplit => write!(f, "pot_split"),
        }
    }
}
