//! Server configuration management.
//!
//! All environment reads happen here. `main` loads `.env` first and passes
//! CLI overrides in.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use trivia_poker::{GameSettings, db::DatabaseConfig};

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP/WebSocket bind address
    pub bind: SocketAddr,
    /// Prometheus scrape address; metrics are off when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Postgres settings. Without them the server runs in memory.
    pub database: Option<DatabaseConfig>,
    /// JSON question bank used in memory mode
    pub questions_path: Option<PathBuf>,
    /// How often WebSocket viewers get the latest snapshot again
    pub snapshot_resend_interval: Duration,
    /// Settings for the rooms created on startup
    pub room_defaults: GameSettings,
    /// Number of rooms to create on startup
    pub initial_rooms: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables, preferring the given
    /// CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but unparsable, or if neither a
    /// database nor a question bank is configured.
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        questions_override: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_env("SERVER_BIND")?.unwrap_or(SocketAddr::from(([127, 0, 0, 1], 6969))),
        };
        let metrics_bind = parse_env("METRICS_BIND")?;

        let database = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .map(DatabaseConfig::with_url);

        let questions_path =
            questions_override.or_else(|| std::env::var("QUESTIONS_FILE").ok().map(PathBuf::from));

        if database.is_none() && questions_path.is_none() {
            return Err(ConfigError::MissingRequired {
                var: "DATABASE_URL or QUESTIONS_FILE".to_string(),
                hint: "Pass --database-url or --questions <bank.json>".to_string(),
            });
        }

        let defaults = GameSettings::default();
        let room_defaults = GameSettings {
            capacity: parse_env_or("ROOM_CAPACITY", defaults.capacity),
            small_blind: parse_env_or("ROOM_SMALL_BLIND", defaults.small_blind),
            big_blind: parse_env_or("ROOM_BIG_BLIND", defaults.big_blind),
            starting_stake: parse_env_or("ROOM_STARTING_STAKE", defaults.starting_stake),
            raise_increment: parse_env_or("ROOM_RAISE_INCREMENT", defaults.raise_increment),
            countdown_secs: parse_env_or("ROOM_COUNTDOWN_SECS", defaults.countdown_secs),
            advance_when_all_estimated: parse_env_or(
                "ROOM_ADVANCE_WHEN_ALL_ESTIMATED",
                defaults.advance_when_all_estimated,
            ),
            auto_advance_betting: parse_env_or(
                "ROOM_AUTO_ADVANCE_BETTING",
                defaults.auto_advance_betting,
            ),
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            database,
            questions_path,
            snapshot_resend_interval: Duration::from_secs(parse_env_or(
                "WS_SNAPSHOT_RESEND_SECS",
                5,
            )),
            room_defaults,
            initial_rooms: parse_env_or("INITIAL_ROOMS", 1),
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.room_defaults
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                var: "ROOM_*".to_string(),
                reason,
            })?;

        if self.snapshot_resend_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "WS_SNAPSHOT_RESEND_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an optional variable, failing loudly if it is set but malformed.
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            var: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            metrics_bind: None,
            database: None,
            questions_path: Some(PathBuf::from("questions.json")),
            snapshot_resend_interval: Duration::from_secs(5),
            room_defaults: GameSettings::default(),
            initial_rooms: 1,
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "QUESTIONS_FILE".to_string(),
            hint: "Pass --questions".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("QUESTIONS_FILE"));
        assert!(msg.contains("Pass --questions"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_big_blind_too_small() {
        let mut config = config();
        config.room_defaults.small_blind = 20;
        config.room_defaults.big_blind = 10;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_zero_resend() {
        let mut config = config();
        config.snapshot_resend_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides_win() {
        let bind: SocketAddr = "0.0.0.0:7000".parse().unwrap();
        let config = ServerConfig::from_env(
            Some(bind),
            None,
            Some(PathBuf::from("bank.json")),
        )
        .unwrap();

        assert_eq!(config.bind, bind);
        assert_eq!(config.questions_path, Some(PathBuf::from("bank.json")));
    }
}
