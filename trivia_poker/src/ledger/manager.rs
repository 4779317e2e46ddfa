//! In-process chip ledger with idempotent batch application.

use super::{
    errors::{LedgerError, LedgerResult},
    models::LedgerEntry,
};
use crate::game::entities::{Chips, PlayerId, RoomId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<(RoomId, PlayerId), Chips>,
    entries: Vec<LedgerEntry>,
    seen_keys: HashSet<String>,
}

/// Chip ledger shared by all room coordinators.
#[derive(Clone, Debug, Default)]
pub struct ChipLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl ChipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persisted balance for a player in a room, if they ever held chips
    /// there.
    pub async fn balance(&self, room_id: RoomId, player_id: PlayerId) -> Option<Chips> {
        let state = self.state.read().await;
        state.balances.get(&(room_id, player_id)).copied()
    }

    /// All balances held in a room.
    pub async fn room_balances(&self, room_id: RoomId) -> HashMap<PlayerId, Chips> {
        let state = self.state.read().await;
        state
            .balances
            .iter()
            .filter(|((room, _), _)| *room == room_id)
            .map(|((_, player), chips)| (*player, *chips))
            .collect()
    }

    /// Entry history for a player in a room, oldest first.
    pub async fn entries(&self, room_id: RoomId, player_id: PlayerId) -> Vec<LedgerEntry> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .filter(|e| e.room_id == room_id && e.player_id == player_id)
            .cloned()
            .collect()
    }

    /// Apply a batch of entries.
    ///
    /// Entries whose idempotency key was already recorded are skipped. The
    /// remaining entries are validated together; if any would fail, none
    /// are applied.
    ///
    /// # Returns
    ///
    /// * `LedgerResult<usize>` - Number of entries applied
    pub async fn record(&self, entries: &[LedgerEntry]) -> LedgerResult<usize> {
        let mut state = self.state.write().await;

        let fresh: Vec<&LedgerEntry> = entries
            .iter()
            .filter(|e| !state.seen_keys.contains(&e.idempotency_key))
            .collect();

        if fresh.len() < entries.len() {
            log::debug!(
                "Skipping {} already recorded ledger entries",
                entries.len() - fresh.len()
            );
        }

        // Validate against a scratch copy so a bad entry leaves nothing behind.
        let mut scratch: HashMap<(RoomId, PlayerId), Chips> = HashMap::new();
        for entry in &fresh {
            if entry.amount == 0 {
                return Err(LedgerError::InvalidAmount(entry.amount));
            }

            let key = (entry.room_id, entry.player_id);
            let current = scratch
                .get(&key)
                .or_else(|| state.balances.get(&key))
                .copied()
                .unwrap_or(0);
            let computed = i64::from(current) + entry.amount;

            if computed < 0 {
                return Err(LedgerError::NegativeBalance {
                    room_id: entry.room_id,
                    player_id: entry.player_id,
                    available: current,
                    required: -entry.amount,
                });
            }

            if computed != i64::from(entry.balance_after) {
                return Err(LedgerError::BalanceMismatch {
                    key: entry.idempotency_key.clone(),
                    computed,
                    recorded: entry.balance_after,
                });
            }

            scratch.insert(key, entry.balance_after);
        }

        let applied = fresh.len();
        for entry in fresh {
            state
                .balances
                .insert((entry.room_id, entry.player_id), entry.balance_after);
            state.seen_keys.insert(entry.idempotency_key.clone());
            state.entries.push(entry.clone());
        }

        Ok(applied)
    }
}
