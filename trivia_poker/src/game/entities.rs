use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{constants, stage::Stage};
use crate::question::QuestionId;

/// Type alias for whole chips. Stacks, bets and pots are all whole chips.
pub type Chips = u32;

/// Room identifier.
pub type RoomId = i64;

/// Player identity as handed to us by the external identity service.
pub type PlayerId = i64;

/// Seat positions at the table, `0..capacity`.
pub type SeatIndex = usize;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Username(String);

impl Username {
    pub fn new(s: &str) -> Self {
        let mut username: String = s
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        username.truncate(constants::MAX_USERNAME_LENGTH);
        Self(username)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<String> for Username {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for Username {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Blinds {
    pub small: Chips,
    pub big: Chips,
}

impl fmt::Display for Blinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.small, self.big)
    }
}

/// Room lifecycle. Only `Waiting` accepts seat changes and only
/// `InProgress` accepts game commands.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomLifecycle {
    Waiting,
    InProgress,
    Completed,
    Closed,
}

impl fmt::Display for RoomLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Closed => "closed",
        };
        write!(f, "{repr}")
    }
}

/// A seated player and their per-round state.
#[derive(Clone, Debug, PartialEq)]
pub struct RoomPlayer {
    pub player_id: PlayerId,
    pub name: Username,
    pub seat: SeatIndex,
    pub chips: Chips,
    /// Chips committed during the current betting stage.
    pub bet: Chips,
    /// Chips committed to the pot during the whole round.
    pub contribution: Chips,
    pub folded: bool,
    /// Acted since the table bet last went up.
    pub acted: bool,
    pub estimate: Option<f64>,
    pub is_host: bool,
}

impl RoomPlayer {
    #[must_use]
    pub fn new(player_id: PlayerId, name: Username, seat: SeatIndex, chips: Chips) -> Self {
        Self {
            player_id,
            name,
            seat,
            chips,
            bet: 0,
            contribution: 0,
            folded: false,
            acted: false,
            estimate: None,
            is_host: false,
        }
    }

    pub fn reset_for_round(&mut self) {
        self.bet = 0;
        self.contribution = 0;
        self.folded = false;
        self.acted = false;
        self.estimate = None;
    }

    /// Move up to `amount` chips from the stack into the pot, returning what
    /// was actually committed.
    pub fn commit_chips(&mut self, amount: Chips) -> Chips {
        let committed = amount.min(self.chips);
        self.chips -= committed;
        self.bet = self.bet.saturating_add(committed);
        self.contribution = self.contribution.saturating_add(committed);
        committed
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.folded
    }

    /// Amount the player still owes to match `table_bet`, before clamping
    /// to their stack.
    #[must_use]
    pub fn owed(&self, table_bet: Chips) -> Chips {
        table_bet.saturating_sub(self.bet)
    }

    /// Whether the player needs no further action this betting stage.
    /// An empty stack counts as matched (implicit all-in).
    #[must_use]
    pub fn is_settled(&self, table_bet: Chips) -> bool {
        self.folded || (self.acted && (self.bet >= table_bet || self.chips == 0))
    }
}

/// Inbound game commands.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SubmitEstimate {
        value: f64,
    },
    Fold,
    /// Shown as "check" when nothing is owed.
    Call,
    Raise {
        #[serde(default)]
        increment: Option<Chips>,
    },
    /// Host continue. `from` pins the stage the host was looking at, so a
    /// second click racing the first is refused instead of skipping ahead.
    AdvanceStage {
        #[serde(default)]
        from: Option<Stage>,
    },
    StartNewRound,
}

impl Command {
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::SubmitEstimate { .. } => CommandKind::SubmitEstimate,
            Self::Fold => CommandKind::Fold,
            Self::Call => CommandKind::Call,
            Self::Raise { .. } => CommandKind::Raise,
            Self::AdvanceStage { .. } => CommandKind::AdvanceStage,
            Self::StartNewRound => CommandKind::StartNewRound,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    SubmitEstimate,
    Fold,
    Call,
    Raise,
    AdvanceStage,
    StartNewRound,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::SubmitEstimate => "submit_estimate",
            Self::Fold => "fold",
            Self::Call => "call",
            Self::Raise => "raise",
            Self::AdvanceStage => "advance_stage",
            Self::StartNewRound => "start_new_round",
        };
        write!(f, "{repr}")
    }
}

/// Client-chosen token that makes a command safe to deliver twice.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CommandToken(String);

impl CommandToken {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CommandToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CommandToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<Uuid> for CommandToken {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

/// How a round's pot was resolved.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Everyone else folded.
    LastStanding,
    /// Closest estimate among active players.
    Closest,
    /// No active player submitted an estimate; the pot was split.
    NoEstimates,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::LastStanding => "last player standing",
            Self::Closest => "closest estimate",
            Self::NoEstimates => "split, no estimates",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Award {
    pub seat: SeatIndex,
    pub player_id: PlayerId,
    pub amount: Chips,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Distance {
    pub seat: SeatIndex,
    pub player_id: PlayerId,
    pub folded: bool,
    pub estimate: Option<f64>,
    pub distance: Option<f64>,
}

/// Terminal result emitted when a round reaches `results`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RoundResult {
    pub room_id: RoomId,
    pub round_number: u32,
    pub outcome: Outcome,
    pub correct_answer: f64,
    pub pot: Chips,
    pub awards: Vec<Award>,
    pub distances: Vec<Distance>,
    /// Every seated player, for the external profile counters.
    pub games_played: Vec<PlayerId>,
    pub games_won: Vec<PlayerId>,
}

impl RoundResult {
    /// Seat of the single winner, if the pot went to one player.
    #[must_use]
    pub fn winner_seat(&self) -> Option<SeatIndex> {
        match self.awards.as_slice() {
            [award] => Some(award.seat),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub seat: SeatIndex,
    pub player_id: PlayerId,
    pub name: Username,
    pub chips: Chips,
    pub bet: Chips,
    pub to_call: Chips,
    pub folded: bool,
    pub has_estimate: bool,
    /// Only disclosed once the round reaches `results`.
    pub estimate: Option<f64>,
    pub is_host: bool,
}

/// Committed room state pushed to viewers after every transition.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RoundStateSnapshot {
    pub room_id: RoomId,
    pub version: u64,
    pub lifecycle: RoomLifecycle,
    pub blinds: Blinds,
    pub round_number: u32,
    pub stage: Option<Stage>,
    pub pot: Chips,
    pub pot_awarded: bool,
    pub table_bet: Chips,
    pub turn: Option<SeatIndex>,
    pub countdown_deadline: Option<DateTime<Utc>>,
    pub question_id: Option<QuestionId>,
    pub prompt: Option<String>,
    pub hints: Vec<String>,
    pub correct_answer: Option<f64>,
    pub players: Vec<PlayerSnapshot>,
}

impl RoundStateSnapshot {
    #[must_use]
    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.player_id == player_id)
    }
}

/// Events produced by committed transitions.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum GameEvent {
    PlayerSeated { player_id: PlayerId, seat: SeatIndex },
    PlayerLeft { player_id: PlayerId },
    HostChanged { player_id: PlayerId },
    GameStarted,
    RoundStarted { round_number: u32 },
    EstimateSubmitted { seat: SeatIndex },
    Folded { seat: SeatIndex },
    Checked { seat: SeatIndex },
    Called { seat: SeatIndex, amount: Chips },
    Raised { seat: SeatIndex, amount: Chips, table_bet: Chips },
    BettingClosed { stage: Stage },
    StageAdvanced { from: Stage, to: Stage },
    PotAwarded { seat: SeatIndex, amount: Chips },
    RoomCompleted,
    RoomClosed,
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerSeated { player_id, seat } => {
                write!(f, "player {player_id} took seat {seat}")
            }
            Self::PlayerLeft { player_id } => write!(f, "player {player_id} left"),
            Self::HostChanged { player_id } => write!(f, "player {player_id} is now host"),
            Self::GameStarted => write!(f, "game started"),
            Self::RoundStarted { round_number } => write!(f, "round {round_number} started"),
            Self::EstimateSubmitted { seat } => write!(f, "seat {seat} locked in an estimate"),
            Self::Folded { seat } => write!(f, "seat {seat} folds"),
            Self::Checked { seat } => write!(f, "seat {seat} checks"),
            Self::Called { seat, amount } => write!(f, "seat {seat} calls {amount}"),
            Self::Raised {
                seat,
                amount,
                table_bet,
            } => write!(f, "seat {seat} raises {amount} to {table_bet}"),
            Self::BettingClosed { stage } => write!(f, "{stage} closed"),
            Self::StageAdvanced { from, to } => write!(f, "{from} -> {to}"),
            Self::PotAwarded { seat, amount } => write!(f, "seat {seat} won {amount}"),
            Self::RoomCompleted => write!(f, "room completed"),
            Self::RoomClosed => write!(f, "room closed"),
        }
    }
}
