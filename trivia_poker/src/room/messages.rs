//! Room actor message types.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::game::{
    GameError, Stage,
    entities::{
        Blinds, Chips, Command, CommandToken, PlayerId, RoomId, RoomLifecycle, RoundResult,
        RoundStateSnapshot,
    },
};

/// Messages that can be sent to a RoomActor
#[derive(Debug)]
pub enum RoomMessage {
    /// Take a seat (waiting rooms only)
    Join {
        player_id: PlayerId,
        name: String,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Give up a seat (waiting rooms only)
    Leave {
        player_id: PlayerId,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Host starts the game
    StartGame {
        player_id: PlayerId,
        token: CommandToken,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Game command from a seated player
    Command {
        player_id: PlayerId,
        token: CommandToken,
        command: Command,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Host closes the room; the actor stops after replying
    Close {
        player_id: PlayerId,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Latest committed snapshot (polling fallback)
    GetSnapshot {
        response: oneshot::Sender<Arc<RoundStateSnapshot>>,
    },

    /// Lobby listing data
    GetSummary {
        response: oneshot::Sender<RoomSummary>,
    },

    /// Subscribe to committed room events
    Subscribe {
        subscriber_id: Uuid,
        sender: mpsc::Sender<RoomEvent>,
    },

    Unsubscribe { subscriber_id: Uuid },
}

/// Pushed to subscribers after every committed transition.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    Snapshot(Arc<RoundStateSnapshot>),
    /// Sent right after the snapshot that entered `results`
    RoundResult(Arc<RoundResult>),
    /// The room closed; no further events follow
    Closed,
}

/// Response from room operations
#[derive(Debug, Clone, PartialEq)]
pub enum RoomResponse {
    /// Command committed; snapshot version after the commit
    Accepted { version: u64 },

    /// Token seen before; nothing was applied again
    Duplicate { version: u64 },

    /// Command refused, state unchanged
    Rejected(GameError),
}

impl RoomResponse {
    /// Check if response is success
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RoomResponse::Accepted { .. } | RoomResponse::Duplicate { .. }
        )
    }

    /// Get error message if response is error
    pub fn error_message(&self) -> Option<String> {
        match self {
            RoomResponse::Rejected(e) => Some(e.to_string()),
            _ => None,
        }
    }

    pub fn version(&self) -> Option<u64> {
        match self {
            RoomResponse::Accepted { version } | RoomResponse::Duplicate { version } => {
                Some(*version)
            }
            RoomResponse::Rejected(_) => None,
        }
    }
}

/// Room listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub name: String,
    pub lifecycle: RoomLifecycle,
    pub player_count: usize,
    pub capacity: usize,
    pub blinds: Blinds,
    pub starting_stake: Chips,
    pub round_number: u32,
    pub stage: Option<Stage>,
}
