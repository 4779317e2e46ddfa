//! Per-room game settings.

use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_BIG_BLIND, DEFAULT_COUNTDOWN_SECS, DEFAULT_SMALL_BLIND, DEFAULT_STARTING_STAKE,
    MAX_SEATS, MIN_SEATS,
};
use super::entities::Chips;

/// Game settings fixed at room creation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct GameSettings {
    /// Number of seats at the table (2-6).
    pub capacity: usize,

    pub small_blind: Chips,

    pub big_blind: Chips,

    /// Stack every player is seated with.
    pub starting_stake: Chips,

    /// Increment used when a raise doesn't name one. Never below the big blind.
    pub raise_increment: Chips,

    /// Length of the question stage countdown.
    pub countdown_secs: u64,

    /// Open betting as soon as every seated player has submitted an estimate.
    pub advance_when_all_estimated: bool,

    /// Leave a betting stage as soon as it completes instead of waiting for
    /// the host to continue.
    pub auto_advance_betting: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            capacity: MAX_SEATS,
            small_blind: DEFAULT_SMALL_BLIND,
            big_blind: DEFAULT_BIG_BLIND,
            starting_stake: DEFAULT_STARTING_STAKE,
            raise_increment: DEFAULT_BIG_BLIND,
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            advance_when_all_estimated: true,
            auto_advance_betting: false,
        }
    }
}

impl GameSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_SEATS..=MAX_SEATS).contains(&self.capacity) {
            return Err(format!(
                "Capacity must be between {MIN_SEATS} and {MAX_SEATS}"
            ));
        }

        if self.small_blind == 0 {
            return Err("Small blind must be positive".to_string());
        }

        if self.big_blind <= self.small_blind {
            return Err("Big blind must be greater than small blind".to_string());
        }

        if self.starting_stake < self.big_blind {
            return Err("Starting stake must cover the big blind".to_string());
        }

        // Every chip at the table has to fit in one pot.
        let table_total = u64::try_from(self.capacity)
            .unwrap_or(u64::MAX)
            .saturating_mul(u64::from(self.starting_stake));
        if table_total > u64::from(Chips::MAX) {
            return Err(format!(
                "Starting stake too large: {} seats x {} exceeds {} chips",
                self.capacity,
                self.starting_stake,
                Chips::MAX
            ));
        }

        if self.raise_increment < self.big_blind {
            return Err("Raise increment must be at least one big blind".to_string());
        }

        if self.countdown_secs == 0 {
            return Err("Countdown must be at least one second".to_string());
        }

        Ok(())
    }

    /// Increment actually applied for a raise request.
    #[must_use]
    pub fn effective_increment(&self, requested: Option<Chips>) -> Chips {
        requested
            .unwrap_or(self.raise_increment)
            .max(self.big_blind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(GameSettings::default().validate().is_ok());
    }

    #[test]
    fn test_capacity_bounds() {
        let mut settings = GameSettings {
            capacity: 1,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        settings.capacity = 7;
        assert!(settings.validate().is_err());

        settings.capacity = 2;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_blind_ordering() {
        let settings = GameSettings {
            small_blind: 10,
            big_blind: 10,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_stake_must_cover_big_blind() {
        let settings = GameSettings {
            starting_stake: 9,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_stake_bounded_by_table_total() {
        let mut settings = GameSettings {
            capacity: 6,
            starting_stake: 1_000_000_000,
            ..Default::default()
        };
        assert!(settings.validate().unwrap_err().contains("Starting stake too large"));

        settings.starting_stake = Chips::MAX / 6;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_increment_floor_is_big_blind() {
        let settings = GameSettings::default();
        assert_eq!(settings.effective_increment(Some(3)), 10);
        assert_eq!(settings.effective_increment(Some(25)), 25);
        assert_eq!(settings.effective_increment(None), 10);
    }
}
