//! Round engine - stage machine, betting and winner resolution.
//!
//! This module provides the per-room game state:
//! - Closed stage enumeration with an explicit transition table
//! - Seat, blind and turn handling for the four betting stages
//! - Pot accounting and closest-estimate resolution
//! - Typed rejections for every command that can't be applied

pub mod constants;
pub mod engine;
pub mod entities;
pub mod errors;
pub mod resolution;
pub mod settings;
pub mod stage;

pub use engine::{RoundEngine, Transition, chips_in_play};
pub use errors::{CommandRejection, GameError, GameResult};
pub use settings::GameSettings;
pub use stage::{Stage, TRANSITIONS, Trigger};
