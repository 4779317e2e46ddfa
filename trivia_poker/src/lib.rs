//! # Trivia Poker
//!
//! Round engine and room coordination for a card-less poker variant:
//! players secretly estimate the answer to a numeric trivia question, then
//! bet across four rounds while hints and finally the answer are revealed.
//! The closest estimate among players who stayed in takes the pot.
//!
//! ## Architecture
//!
//! A round walks a fixed sequence of stages:
//!
//! - **Question**: estimates are collected until the countdown ends
//! - **Betting1..Betting4**: fold, call/check or raise in seat order
//! - **Hint1/Hint2**: one hint revealed each, host continues
//! - **Reveal**: the answer is shown before the last betting round
//! - **Results**: pot awarded, host may deal the next round
//!
//! ## Core Modules
//!
//! - [`game`]: Stage machine, betting rules and winner resolution
//! - [`room`]: One actor per room serializing commands into its engine
//! - [`ledger`]: Chip balances moved only by committed transitions
//! - [`question`]: Where round questions come from
//! - [`db`]: Persisted layout of rooms, seats and bound questions

/// Persisted room state and connection pooling.
pub mod db;

/// Round engine, entities and stage machine.
pub mod game;
pub use game::{
    CommandRejection, GameError, GameResult, GameSettings, RoundEngine, Stage, Transition,
    constants,
    entities::{self, Command, CommandToken, RoundResult, RoundStateSnapshot},
};

/// Chip balances.
pub mod ledger;

/// Question source seam.
pub mod question;

/// Session coordinators.
pub mod room;
pub use room::{RoomConfig, RoomEvent, RoomManager, RoomResponse};
