//! Room configuration.

use serde::{Deserialize, Serialize};

use crate::game::GameSettings;

pub const MAX_ROOM_NAME_LENGTH: usize = 64;

/// Room configuration, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub name: String,

    #[serde(flatten)]
    pub settings: GameSettings,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: "Trivia Table".to_string(),
            settings: GameSettings::default(),
        }
    }
}

impl RoomConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Room name must not be empty".to_string());
        }
        if name.chars().count() > MAX_ROOM_NAME_LENGTH {
            return Err(format!(
                "Room name must be at most {MAX_ROOM_NAME_LENGTH} characters"
            ));
        }
        self.settings.validate()
    }
}
