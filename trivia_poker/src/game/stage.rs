//! Round stages and the transition table between them.
//!
//! A round walks the stages in a fixed order:
//!
//! ```text
//! question -> betting1 -> hint1 -> betting2 -> hint2 -> betting3 -> reveal -> betting4 -> results
//! ```
//!
//! Each stage is left by exactly one [`Trigger`]. `results` loops back to
//! `question` when the host starts a new round.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entities::CommandKind;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Question,
    Betting1,
    Hint1,
    Betting2,
    Hint2,
    Betting3,
    Reveal,
    Betting4,
    Results,
}

/// What moves a round out of a stage.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Question countdown elapsed, or every player submitted an estimate.
    Countdown,
    /// Host issued "continue".
    HostContinue,
    /// Betting-round-complete predicate holds and the host continued.
    BettingComplete,
    /// Host started a new round.
    NewRound,
}

/// `(from, to, trigger)` indexed by `from as usize`.
pub const TRANSITIONS: [(Stage, Stage, Trigger); 9] = [
    (Stage::Question, Stage::Betting1, Trigger::Countdown),
    (Stage::Betting1, Stage::Hint1, Trigger::BettingComplete),
    (Stage::Hint1, Stage::Betting2, Trigger::HostContinue),
    (Stage::Betting2, Stage::Hint2, Trigger::BettingComplete),
    (Stage::Hint2, Stage::Betting3, Trigger::HostContinue),
    (Stage::Betting3, Stage::Reveal, Trigger::BettingComplete),
    (Stage::Reveal, Stage::Betting4, Trigger::HostContinue),
    (Stage::Betting4, Stage::Results, Trigger::BettingComplete),
    (Stage::Results, Stage::Question, Trigger::NewRound),
];

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Question,
        Stage::Betting1,
        Stage::Hint1,
        Stage::Betting2,
        Stage::Hint2,
        Stage::Betting3,
        Stage::Reveal,
        Stage::Betting4,
        Stage::Results,
    ];

    #[must_use]
    pub fn next(self) -> Stage {
        TRANSITIONS[self as usize].1
    }

    #[must_use]
    pub fn exit_trigger(self) -> Trigger {
        TRANSITIONS[self as usize].2
    }

    #[must_use]
    pub fn is_betting(self) -> bool {
        matches!(
            self,
            Stage::Betting1 | Stage::Betting2 | Stage::Betting3 | Stage::Betting4
        )
    }

    /// Whether `kind` is valid in this stage at all (turn order is checked
    /// separately).
    #[must_use]
    pub fn accepts(self, kind: CommandKind) -> bool {
        match kind {
            CommandKind::SubmitEstimate => self == Stage::Question,
            CommandKind::Fold | CommandKind::Call | CommandKind::Raise => self.is_betting(),
            CommandKind::AdvanceStage => matches!(
                self.exit_trigger(),
                Trigger::HostContinue | Trigger::BettingComplete
            ),
            CommandKind::StartNewRound => self == Stage::Results,
        }
    }

    /// Number of hints visible to players in this stage.
    #[must_use]
    pub fn hints_revealed(self) -> usize {
        match self {
            Stage::Question | Stage::Betting1 => 0,
            Stage::Hint1 | Stage::Betting2 => 1,
            Stage::Hint2 | Stage::Betting3 | Stage::Reveal | Stage::Betting4 | Stage::Results => 2,
        }
    }

    #[must_use]
    pub fn answer_revealed(self) -> bool {
        matches!(self, Stage::Reveal | Stage::Betting4 | Stage::Results)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Stage::Question => "question",
            Stage::Betting1 => "betting1",
            Stage::Hint1 => "hint1",
            Stage::Betting2 => "betting2",
            Stage::Hint2 => "hint2",
            Stage::Betting3 => "betting3",
            Stage::Reveal => "reveal",
            Stage::Betting4 => "betting4",
            Stage::Results => "results",
        };
        write!(f, "{repr}")
    }
}
