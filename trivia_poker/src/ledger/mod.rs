//! Chip ledger: per-player chip balances for each room.
//!
//! The round engine is the only writer. Every committed engine transition
//! that moves chips carries a list of [`LedgerEntry`] deltas; the room
//! coordinator hands them to [`ChipLedger::record`] after the commit.
//!
//! - Each entry carries an idempotency key, so replaying a batch is a no-op
//! - A batch is checked as a whole before any entry is applied
//! - Balances can never go negative
//!
//! ## Example
//!
//! ```
//! use trivia_poker::ledger::{ChipLedger, EntryType, LedgerEntry};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = ChipLedger::new();
//! let entry = LedgerEntry::credit(1, 42, 0, 500, 500, EntryType::BuyIn, "1-42-buy-in".to_string());
//! ledger.record(&[entry]).await?;
//! assert_eq!(ledger.balance(1, 42).await, Some(500));
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use manager::ChipLedger;
pub use models::{EntryDirection, EntryType, LedgerEntry};
