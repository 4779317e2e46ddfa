//! Session coordination: one async actor per room.
//!
//! This module implements:
//! - RoomActor: owns a room's [`RoundEngine`](crate::game::RoundEngine) and
//!   applies commands one at a time from its mailbox
//! - RoomManager: spawns room actors and routes requests to them
//! - Command tokens, so a duplicated command is answered without being
//!   applied twice
//! - Fire-and-forget event push to subscribers, with the latest snapshot
//!   always available on request
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use trivia_poker::game::entities::{Command, CommandToken};
//! use trivia_poker::ledger::ChipLedger;
//! use trivia_poker::question::{Question, StaticQuestionSource};
//! use trivia_poker::room::{RoomConfig, RoomManager};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let questions = StaticQuestionSource::new(vec![Question {
//!     id: 1,
//!     prompt: "Boiling point of water in Fahrenheit?".to_string(),
//!     hints: ["Above 200".to_string(), "Below 220".to_string()],
//!     correct_answer: 212.0,
//!     difficulty: 1,
//! }])?;
//! let manager = RoomManager::new(Arc::new(questions), ChipLedger::new());
//!
//! let room = manager.create_room(RoomConfig::default()).await?;
//! manager.join(room, 1, "ada".to_string()).await?;
//! manager.join(room, 2, "grace".to_string()).await?;
//! manager.start_game(room, 1, CommandToken::random()).await?;
//!
//! let response = manager
//!     .command(room, 1, CommandToken::random(), Command::SubmitEstimate { value: 210.0 })
//!     .await?;
//! assert!(response.is_success());
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod errors;
pub mod manager;
pub mod messages;

pub use actor::{RoomActor, RoomHandle, TOKEN_CACHE_SIZE};
pub use config::RoomConfig;
pub use errors::{RoomError, RoomResult};
pub use manager::RoomManager;
pub use messages::{RoomEvent, RoomMessage, RoomResponse, RoomSummary};
