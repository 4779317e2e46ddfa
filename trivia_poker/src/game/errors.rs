//! Game error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    entities::{CommandKind, PlayerId, RoomLifecycle, SeatIndex},
    stage::Stage,
};

/// Why a command was refused. Refusals never change state and are only
/// reported back to the issuing client.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum CommandRejection {
    #[error("player {0} is not seated here")]
    UnknownPlayer(PlayerId),
    #[error("player {0} is already seated")]
    AlreadySeated(PlayerId),
    #[error("room is full")]
    RoomFull,
    #[error("room is {0}")]
    WrongLifecycle(RoomLifecycle),
    #[error("need {required}+ players")]
    NotEnoughPlayers { required: usize },
    #[error("only the host can do that")]
    NotHost,
    #[error("no round in progress")]
    NoRound,
    #[error("{command} is not accepted during {stage}")]
    WrongStage { stage: Stage, command: CommandKind },
    #[error("not your turn (seat {expected:?} is up)")]
    NotYourTurn { expected: Option<SeatIndex> },
    #[error("estimate already submitted")]
    AlreadySubmitted,
    #[error("estimate must be a finite number")]
    InvalidEstimate,
    #[error("can't raise with an empty stack")]
    CannotRaise,
    #[error("stage already moved on from {from} to {current}")]
    StageAlreadyAdvanced { from: Stage, current: Stage },
    #[error("betting is still open")]
    BettingIncomplete,
    #[error("countdown for round {0} no longer applies")]
    StaleCountdown(u32),
}

/// Errors returned by the round engine.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    /// Wrong turn, wrong stage, unknown room or player.
    #[error("invalid command: {0}")]
    InvalidCommand(#[from] CommandRejection),

    /// A round could not be dealt because no question was available. The
    /// room stays where it was.
    #[error("no question available: {0}")]
    NoQuestionAvailable(String),
}

impl GameError {
    #[must_use]
    pub fn rejection(&self) -> Option<&CommandRejection> {
        match self {
            GameError::InvalidCommand(rejection) => Some(rejection),
            GameError::NoQuestionAvailable(_) => None,
        }
    }
}

/// Result type for engine operations
pub type GameResult<T> = Result<T, GameError>;
