//! Ledger error types.

use thiserror::Error;

use crate::game::entities::{Chips, PlayerId, RoomId};

/// Ledger errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Applying the entry would take the balance below zero
    #[error("Balance for player {player_id} in room {room_id} would go negative: have {available}, debit {required}")]
    NegativeBalance {
        room_id: RoomId,
        player_id: PlayerId,
        available: Chips,
        required: i64,
    },

    /// Entry's recorded balance disagrees with the ledger
    #[error("Balance mismatch for key {key}: ledger computes {computed}, entry says {recorded}")]
    BalanceMismatch {
        key: String,
        computed: i64,
        recorded: Chips,
    },

    /// Entry moves zero chips
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),
}

impl LedgerError {
    /// Get a client-safe error message that doesn't leak player or room IDs
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::NegativeBalance { .. } => "Insufficient chips".to_string(),
            LedgerError::BalanceMismatch { .. } => "Internal ledger error".to_string(),
            LedgerError::InvalidAmount(_) => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
