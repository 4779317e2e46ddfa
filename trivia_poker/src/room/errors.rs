//! Room coordinator error types.

use thiserror::Error;

use crate::game::entities::RoomId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room {0} not found")]
    RoomNotFound(RoomId),

    /// The room's coordinator stopped before answering
    #[error("Room {0} is no longer running")]
    RoomStopped(RoomId),

    #[error("Invalid room configuration: {0}")]
    InvalidConfig(String),
}

impl RoomError {
    pub fn client_message(&self) -> String {
        match self {
            RoomError::RoomNotFound(_) | RoomError::RoomStopped(_) => "Room not found".to_string(),
            RoomError::InvalidConfig(_) => self.to_string(),
        }
    }
}

pub type RoomResult<T> = Result<T, RoomError>;
