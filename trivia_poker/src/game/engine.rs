//! The round engine: authoritative per-room game state.
//!
//! Every public mutator either rejects the command with a typed error and
//! leaves state untouched, or commits and returns a [`Transition`] with the
//! events, ledger deltas and (at `results`) the round result. All decisions
//! are made on the state as it stands inside that single call; the caller
//! never has to re-read anything to know what happened.

use chrono::{DateTime, Duration, Utc};

use super::{
    constants::{BIG_BLIND_SEAT, MIN_SEATS, SMALL_BLIND_SEAT},
    entities::{
        Award, Blinds, Chips, Command, Distance, GameEvent, PlayerId, PlayerSnapshot,
        RoomId, RoomLifecycle, RoomPlayer, RoundResult, RoundStateSnapshot, SeatIndex, Username,
    },
    errors::{CommandRejection, GameError, GameResult},
    resolution,
    settings::GameSettings,
    stage::Stage,
};
use crate::ledger::{EntryType, LedgerEntry};
use crate::question::Question;

/// Everything a committed step produced.
#[derive(Clone, Debug, Default)]
pub struct Transition {
    pub events: Vec<GameEvent>,
    pub ledger: Vec<LedgerEntry>,
    pub result: Option<RoundResult>,
}

impl Transition {
    fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}

#[derive(Clone, Debug)]
struct Round {
    number: u32,
    stage: Stage,
    pot: Chips,
    pot_awarded: bool,
    table_bet: Chips,
    turn: Option<SeatIndex>,
    countdown_deadline: Option<DateTime<Utc>>,
    question: Question,
}

#[derive(Clone, Debug)]
pub struct RoundEngine {
    room_id: RoomId,
    settings: GameSettings,
    lifecycle: RoomLifecycle,
    /// Seat order; `players[i].seat == i`.
    players: Vec<RoomPlayer>,
    round: Option<Round>,
    rounds_played: u32,
    version: u64,
}

impl RoundEngine {
    #[must_use]
    pub fn new(room_id: RoomId, settings: GameSettings) -> Self {
        Self {
            room_id,
            settings,
            lifecycle: RoomLifecycle::Waiting,
            players: Vec::new(),
            round: None,
            rounds_played: 0,
            version: 0,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    #[must_use]
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    #[must_use]
    pub fn lifecycle(&self) -> RoomLifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn players(&self) -> &[RoomPlayer] {
        &self.players
    }

    #[must_use]
    pub fn player(&self, player_id: PlayerId) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    #[must_use]
    pub fn host(&self) -> Option<PlayerId> {
        self.players.iter().find(|p| p.is_host).map(|p| p.player_id)
    }

    /// Incremented on every committed transition.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn round_number(&self) -> u32 {
        self.rounds_played
    }

    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        self.round.as_ref().map(|r| r.stage)
    }

    #[must_use]
    pub fn pot(&self) -> Chips {
        self.round.as_ref().map_or(0, |r| r.pot)
    }

    #[must_use]
    pub fn pot_awarded(&self) -> bool {
        self.round.as_ref().is_some_and(|r| r.pot_awarded)
    }

    #[must_use]
    pub fn table_bet(&self) -> Chips {
        self.round.as_ref().map_or(0, |r| r.table_bet)
    }

    #[must_use]
    pub fn turn(&self) -> Option<SeatIndex> {
        self.round.as_ref().and_then(|r| r.turn)
    }

    #[must_use]
    pub fn countdown_deadline(&self) -> Option<DateTime<Utc>> {
        self.round.as_ref().and_then(|r| r.countdown_deadline)
    }

    #[must_use]
    pub fn question(&self) -> Option<&Question> {
        self.round.as_ref().map(|r| &r.question)
    }

    #[must_use]
    pub fn blinds(&self) -> Blinds {
        Blinds {
            small: self.settings.small_blind,
            big: self.settings.big_blind,
        }
    }

    /// Every active player has settled the current betting stage.
    #[must_use]
    pub fn is_betting_complete(&self) -> bool {
        let table_bet = self.table_bet();
        self.players.iter().all(|p| p.is_settled(table_bet))
    }

    // Room lifecycle.

    /// Seat a player at the lowest free seat. `persisted` is the player's
    /// ledger balance for this room, if they held chips here before; without
    /// one the player buys in for the starting stake.
    pub fn seat_player(
        &mut self,
        player_id: PlayerId,
        name: Username,
        persisted: Option<Chips>,
    ) -> GameResult<Transition> {
        self.require_lifecycle(RoomLifecycle::Waiting)?;
        if self.player(player_id).is_some() {
            return Err(CommandRejection::AlreadySeated(player_id).into());
        }
        if self.players.len() >= self.settings.capacity {
            return Err(CommandRejection::RoomFull.into());
        }

        let seat = self.players.len();
        let chips = persisted.unwrap_or(self.settings.starting_stake);
        let mut player = RoomPlayer::new(player_id, name, seat, chips);
        player.is_host = self.players.is_empty();

        let mut tx = Transition::default();
        if persisted.is_none() && chips > 0 {
            tx.ledger.push(LedgerEntry::credit(
                self.room_id,
                player_id,
                0,
                chips,
                chips,
                EntryType::BuyIn,
                format!("{}-buy-in-p{player_id}", self.room_id),
            ));
        }
        tx.push(GameEvent::PlayerSeated { player_id, seat });
        if player.is_host {
            tx.push(GameEvent::HostChanged { player_id });
        }

        log::info!(
            "Room {}: {} ({}) took seat {} with {} chips",
            self.room_id,
            player.name,
            player_id,
            seat,
            chips
        );
        self.players.push(player);
        Ok(self.commit(tx))
    }

    /// Unseat a player. Seats are compacted and the host passes to seat 0.
    pub fn remove_player(&mut self, player_id: PlayerId) -> GameResult<Transition> {
        self.require_lifecycle(RoomLifecycle::Waiting)?;
        let seat = self.seat_of(player_id)?;

        let removed = self.players.remove(seat);
        for (idx, player) in self.players.iter_mut().enumerate() {
            player.seat = idx;
        }

        let mut tx = Transition::default();
        tx.push(GameEvent::PlayerLeft { player_id });
        if removed.is_host {
            if let Some(next) = self.players.first_mut() {
                next.is_host = true;
                tx.push(GameEvent::HostChanged {
                    player_id: next.player_id,
                });
            }
        }

        log::info!("Room {}: player {} left", self.room_id, player_id);
        Ok(self.commit(tx))
    }

    /// Check that `actor` may start the game right now, without changing
    /// anything. Lets the caller fetch a question only when it will be used.
    pub fn check_start_game(&self, actor: PlayerId) -> GameResult<()> {
        self.require_lifecycle(RoomLifecycle::Waiting)?;
        self.require_host(actor)?;
        if self.players.len() < MIN_SEATS {
            return Err(CommandRejection::NotEnoughPlayers {
                required: MIN_SEATS,
            }
            .into());
        }
        Ok(())
    }

    /// Move the room to `in_progress` and deal round 1.
    pub fn start_game(
        &mut self,
        actor: PlayerId,
        question: Question,
        now: DateTime<Utc>,
    ) -> GameResult<Transition> {
        self.check_start_game(actor)?;

        self.lifecycle = RoomLifecycle::InProgress;
        let mut tx = Transition::default();
        tx.push(GameEvent::GameStarted);
        self.begin_round(question, now, &mut tx);

        log::info!(
            "Room {}: game started with {} players",
            self.room_id,
            self.players.len()
        );
        Ok(self.commit(tx))
    }

    /// Host closes the room. Any pot still on the table stays unawarded.
    pub fn close(&mut self, actor: PlayerId) -> GameResult<Transition> {
        if self.lifecycle == RoomLifecycle::Closed {
            return Err(CommandRejection::WrongLifecycle(self.lifecycle).into());
        }
        self.require_host(actor)?;

        self.lifecycle = RoomLifecycle::Closed;
        if let Some(round) = self.round.as_mut() {
            round.turn = None;
            round.countdown_deadline = None;
        }

        let mut tx = Transition::default();
        tx.push(GameEvent::RoomClosed);
        log::info!("Room {}: closed by host {}", self.room_id, actor);
        Ok(self.commit(tx))
    }

    // Game commands.

    /// Whether `command` from `player` is acceptable and needs a fresh
    /// question to be applied. Rejections are the same ones `handle` would
    /// return.
    pub fn requires_question(&self, player: PlayerId, command: &Command) -> GameResult<bool> {
        self.validate(player, command)?;
        Ok(matches!(command, Command::StartNewRound) && self.funded_players() >= MIN_SEATS)
    }

    /// Apply one player command. `question` is consumed only by a
    /// `StartNewRound` that deals a new round.
    pub fn handle(
        &mut self,
        player: PlayerId,
        command: Command,
        question: Option<Question>,
        now: DateTime<Utc>,
    ) -> GameResult<Transition> {
        let (seat, stage) = self.validate(player, &command)?;

        let mut tx = Transition::default();
        match command {
            Command::SubmitEstimate { value } => self.submit_estimate(seat, value, &mut tx),
            Command::Fold => self.fold(seat, stage, &mut tx),
            Command::Call => self.call(seat, &mut tx),
            Command::Raise { increment } => self.raise(seat, increment, &mut tx),
            Command::AdvanceStage { .. } => self.advance_stage(stage, &mut tx),
            Command::StartNewRound => self.start_new_round(question, now, &mut tx)?,
        }

        Ok(self.commit(tx))
    }

    /// The question countdown for `round_number` fired. Ignored with
    /// `StaleCountdown` if that round is gone or already left `question`.
    pub fn countdown_elapsed(&mut self, round_number: u32) -> GameResult<Transition> {
        let stale = CommandRejection::StaleCountdown(round_number);
        if self.lifecycle != RoomLifecycle::InProgress {
            return Err(stale.into());
        }
        match self.round.as_ref() {
            Some(round) if round.number == round_number && round.stage == Stage::Question => {}
            _ => return Err(stale.into()),
        }

        log::debug!(
            "Room {}: countdown for round {} elapsed",
            self.room_id,
            round_number
        );
        let mut tx = Transition::default();
        self.advance_stage(Stage::Question, &mut tx);
        Ok(self.commit(tx))
    }

    #[must_use]
    pub fn snapshot(&self) -> RoundStateSnapshot {
        let round = self.round.as_ref();
        let stage = round.map(|r| r.stage);
        let betting = stage.is_some_and(Stage::is_betting);
        let show_estimates = stage == Some(Stage::Results);
        let table_bet = self.table_bet();

        let players = self
            .players
            .iter()
            .map(|p| PlayerSnapshot {
                seat: p.seat,
                player_id: p.player_id,
                name: p.name.clone(),
                chips: p.chips,
                bet: p.bet,
                to_call: if betting && p.is_active() {
                    p.owed(table_bet).min(p.chips)
                } else {
                    0
                },
                folded: p.folded,
                has_estimate: p.estimate.is_some(),
                estimate: if show_estimates { p.estimate } else { None },
                is_host: p.is_host,
            })
            .collect();

        RoundStateSnapshot {
            room_id: self.room_id,
            version: self.version,
            lifecycle: self.lifecycle,
            blinds: self.blinds(),
            round_number: self.rounds_played,
            stage,
            pot: self.pot(),
            pot_awarded: self.pot_awarded(),
            table_bet,
            turn: self.turn(),
            countdown_deadline: self.countdown_deadline(),
            question_id: round.map(|r| r.question.id),
            prompt: round.map(|r| r.question.prompt.clone()),
            hints: round
                .map(|r| r.question.hints[..r.stage.hints_revealed()].to_vec())
                .unwrap_or_default(),
            correct_answer: round
                .filter(|r| r.stage.answer_revealed())
                .map(|r| r.question.correct_answer),
            players,
        }
    }

    // Internals.

    fn commit(&mut self, tx: Transition) -> Transition {
        self.version += 1;
        tx
    }

    fn require_lifecycle(&self, expected: RoomLifecycle) -> GameResult<()> {
        if self.lifecycle == expected {
            Ok(())
        } else {
            Err(CommandRejection::WrongLifecycle(self.lifecycle).into())
        }
    }

    fn seat_of(&self, player_id: PlayerId) -> GameResult<SeatIndex> {
        self.player(player_id)
            .map(|p| p.seat)
            .ok_or_else(|| CommandRejection::UnknownPlayer(player_id).into())
    }

    fn require_host(&self, actor: PlayerId) -> GameResult<()> {
        let seat = self.seat_of(actor)?;
        if self.players[seat].is_host {
            Ok(())
        } else {
            Err(CommandRejection::NotHost.into())
        }
    }

    fn funded_players(&self) -> usize {
        self.players.iter().filter(|p| p.chips > 0).count()
    }

    fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_active()).count()
    }

    /// Every check a command must pass before it may touch state.
    fn validate(&self, player: PlayerId, command: &Command) -> GameResult<(SeatIndex, Stage)> {
        self.require_lifecycle(RoomLifecycle::InProgress)?;
        let round = self.round.as_ref().ok_or(CommandRejection::NoRound)?;
        let seat = self.seat_of(player)?;
        let stage = round.stage;
        let kind = command.kind();

        if !stage.accepts(kind) {
            return Err(CommandRejection::WrongStage {
                stage,
                command: kind,
            }
            .into());
        }

        match command {
            Command::SubmitEstimate { value } => {
                if !value.is_finite() {
                    return Err(CommandRejection::InvalidEstimate.into());
                }
                if self.players[seat].estimate.is_some() {
                    return Err(CommandRejection::AlreadySubmitted.into());
                }
            }
            Command::Fold | Command::Call | Command::Raise { .. } => {
                if round.turn != Some(seat) {
                    return Err(CommandRejection::NotYourTurn {
                        expected: round.turn,
                    }
                    .into());
                }
                if matches!(command, Command::Raise { .. }) && self.players[seat].chips == 0 {
                    return Err(CommandRejection::CannotRaise.into());
                }
            }
            Command::AdvanceStage { from } => {
                if let Some(from) = *from
                    && from != stage
                {
                    return Err(CommandRejection::StageAlreadyAdvanced {
                        from,
                        current: stage,
                    }
                    .into());
                }
                self.require_host(player)?;
                if stage.is_betting() && !self.is_betting_complete() {
                    return Err(CommandRejection::BettingIncomplete.into());
                }
            }
            Command::StartNewRound => self.require_host(player)?,
        }

        Ok((seat, stage))
    }

    fn begin_round(&mut self, question: Question, now: DateTime<Utc>, tx: &mut Transition) {
        self.rounds_played += 1;
        let number = self.rounds_played;
        for player in &mut self.players {
            player.reset_for_round();
        }

        let mut pot: Chips = 0;
        for (seat, blind) in [
            (SMALL_BLIND_SEAT, self.settings.small_blind),
            (BIG_BLIND_SEAT, self.settings.big_blind),
        ] {
            let Some(player) = self.players.get_mut(seat) else {
                continue;
            };
            let posted = player.commit_chips(blind);
            pot = pot.saturating_add(posted);
            if posted > 0 {
                tx.ledger.push(LedgerEntry::debit(
                    self.room_id,
                    player.player_id,
                    number,
                    posted,
                    player.chips,
                    EntryType::Blind,
                    format!("{}-r{number}-p{}-blind", self.room_id, player.player_id),
                ));
            }
        }

        let countdown = i64::try_from(self.settings.countdown_secs).unwrap_or(i64::MAX);
        self.round = Some(Round {
            number,
            stage: Stage::Question,
            pot,
            pot_awarded: false,
            table_bet: self.settings.big_blind,
            turn: None,
            countdown_deadline: Some(now + Duration::seconds(countdown)),
            question,
        });

        tx.push(GameEvent::RoundStarted {
            round_number: number,
        });
        log::info!(
            "Room {}: round {} dealt, pot {}",
            self.room_id,
            number,
            pot
        );
    }

    fn submit_estimate(&mut self, seat: SeatIndex, value: f64, tx: &mut Transition) {
        self.players[seat].estimate = Some(value);
        tx.push(GameEvent::EstimateSubmitted { seat });

        let all_in = self.players.iter().all(|p| p.estimate.is_some());
        if all_in && self.settings.advance_when_all_estimated {
            self.advance_stage(Stage::Question, tx);
        }
    }

    fn fold(&mut self, seat: SeatIndex, stage: Stage, tx: &mut Transition) {
        let player = &mut self.players[seat];
        player.folded = true;
        player.acted = true;
        tx.push(GameEvent::Folded { seat });

        if self.active_count() == 1 {
            log::debug!(
                "Room {}: one player left in {}, awarding pot",
                self.room_id,
                stage
            );
            tx.push(GameEvent::StageAdvanced {
                from: stage,
                to: Stage::Results,
            });
            self.enter_stage(Stage::Results, tx);
        } else {
            self.after_action(seat, tx);
        }
    }

    fn call(&mut self, seat: SeatIndex, tx: &mut Transition) {
        let table_bet = self.table_bet();
        let number = self.rounds_played;
        let key = self.entry_key(seat, EntryType::Call);

        let player = &mut self.players[seat];
        let committed = player.commit_chips(player.owed(table_bet));
        player.acted = true;

        if committed == 0 {
            tx.push(GameEvent::Checked { seat });
        } else {
            tx.ledger.push(LedgerEntry::debit(
                self.room_id,
                player.player_id,
                number,
                committed,
                player.chips,
                EntryType::Call,
                key,
            ));
            tx.push(GameEvent::Called {
                seat,
                amount: committed,
            });
        }

        self.add_to_pot(committed);
        self.after_action(seat, tx);
    }

    fn raise(&mut self, seat: SeatIndex, increment: Option<Chips>, tx: &mut Transition) {
        let old_table_bet = self.table_bet();
        let target = old_table_bet.saturating_add(self.settings.effective_increment(increment));
        let number = self.rounds_played;
        let key = self.entry_key(seat, EntryType::Raise);

        let player = &mut self.players[seat];
        let committed = player.commit_chips(target.saturating_sub(player.bet));
        player.acted = true;
        let new_table_bet = old_table_bet.max(player.bet);

        if committed > 0 {
            tx.ledger.push(LedgerEntry::debit(
                self.room_id,
                player.player_id,
                number,
                committed,
                player.chips,
                EntryType::Raise,
                key,
            ));
        }
        tx.push(GameEvent::Raised {
            seat,
            amount: committed,
            table_bet: new_table_bet,
        });

        self.add_to_pot(committed);
        if new_table_bet > old_table_bet {
            if let Some(round) = self.round.as_mut() {
                round.table_bet = new_table_bet;
            }
            // Everyone else has to answer the new bet.
            for other in self.players.iter_mut().filter(|p| p.seat != seat && p.is_active()) {
                other.acted = false;
            }
        }
        self.after_action(seat, tx);
    }

    fn add_to_pot(&mut self, chips: Chips) {
        if let Some(round) = self.round.as_mut() {
            round.pot = round.pot.saturating_add(chips);
        }
    }

    /// Completion check and turn advancement, computed together on the
    /// state the action just produced.
    fn after_action(&mut self, seat: SeatIndex, tx: &mut Transition) {
        let Some(stage) = self.stage() else {
            return;
        };

        if self.is_betting_complete() {
            if let Some(round) = self.round.as_mut() {
                round.turn = None;
            }
            tx.push(GameEvent::BettingClosed { stage });
            if self.settings.auto_advance_betting {
                self.advance_stage(stage, tx);
            }
            return;
        }

        let next = self.next_unsettled(seat + 1);
        if let Some(round) = self.round.as_mut() {
            round.turn = next;
        }
    }

    /// First unsettled seat at or after `from`, wrapping.
    fn next_unsettled(&self, from: SeatIndex) -> Option<SeatIndex> {
        let n = self.players.len();
        let table_bet = self.table_bet();
        (0..n)
            .map(|offset| (from + offset) % n)
            .find(|&seat| !self.players[seat].is_settled(table_bet))
    }

    fn advance_stage(&mut self, from: Stage, tx: &mut Transition) {
        let to = from.next();
        tx.push(GameEvent::StageAdvanced { from, to });
        log::debug!("Room {}: {} -> {}", self.room_id, from, to);
        self.enter_stage(to, tx);
    }

    fn enter_stage(&mut self, stage: Stage, tx: &mut Transition) {
        let Some(round) = self.round.as_mut() else {
            return;
        };
        round.stage = stage;
        round.countdown_deadline = None;
        round.turn = None;

        if stage == Stage::Results {
            self.award_pot(tx);
            return;
        }
        if !stage.is_betting() {
            return;
        }

        // Betting1 keeps the posted blinds.
        if stage != Stage::Betting1 {
            round.table_bet = 0;
            for player in &mut self.players {
                player.bet = 0;
            }
        }
        for player in &mut self.players {
            player.acted = false;
        }

        let first = if stage == Stage::Betting1 {
            BIG_BLIND_SEAT + 1
        } else {
            0
        };
        let turn = self.next_unsettled(first);
        if let Some(round) = self.round.as_mut() {
            round.turn = turn;
        }
    }

    fn award_pot(&mut self, tx: &mut Transition) {
        let Some(round) = self.round.as_mut() else {
            return;
        };
        if round.pot_awarded {
            return;
        }
        round.pot_awarded = true;
        let pot = round.pot;
        let answer = round.question.correct_answer;
        let number = round.number;

        let resolution = resolution::resolve(&self.players, answer, pot);
        let entry_type = if resolution.shares.len() > 1 {
            EntryType::PotSplit
        } else {
            EntryType::PotAward
        };

        let mut awards = Vec::with_capacity(resolution.shares.len());
        for &(seat, amount) in &resolution.shares {
            let key = self.entry_key(seat, entry_type);
            let player = &mut self.players[seat];
            player.chips = player.chips.saturating_add(amount);
            if amount > 0 {
                tx.ledger.push(LedgerEntry::credit(
                    self.room_id,
                    player.player_id,
                    number,
                    amount,
                    player.chips,
                    entry_type,
                    key,
                ));
            }
            tx.push(GameEvent::PotAwarded { seat, amount });
            awards.push(Award {
                seat,
                player_id: player.player_id,
                amount,
            });
        }

        let distances = resolution
            .distances
            .iter()
            .map(|&(seat, distance)| {
                let p = &self.players[seat];
                Distance {
                    seat,
                    player_id: p.player_id,
                    folded: p.folded,
                    estimate: p.estimate,
                    distance,
                }
            })
            .collect();

        log::info!(
            "Room {}: round {} resolved by {}, pot {} to seats {:?}",
            self.room_id,
            number,
            resolution.outcome,
            pot,
            resolution.shares.iter().map(|(s, _)| *s).collect::<Vec<_>>()
        );

        tx.result = Some(RoundResult {
            room_id: self.room_id,
            round_number: number,
            outcome: resolution.outcome,
            correct_answer: answer,
            pot,
            games_won: awards.iter().map(|a| a.player_id).collect(),
            awards,
            distances,
            games_played: self.players.iter().map(|p| p.player_id).collect(),
        });
    }

    fn start_new_round(
        &mut self,
        question: Option<Question>,
        now: DateTime<Utc>,
        tx: &mut Transition,
    ) -> GameResult<()> {
        if self.funded_players() < MIN_SEATS {
            self.lifecycle = RoomLifecycle::Completed;
            tx.push(GameEvent::RoomCompleted);
            log::info!(
                "Room {}: completed after {} rounds",
                self.room_id,
                self.rounds_played
            );
            return Ok(());
        }

        let question = question.ok_or_else(|| {
            GameError::NoQuestionAvailable("no question supplied for the next round".to_string())
        })?;
        self.begin_round(question, now, tx);
        Ok(())
    }

    /// Ledger key for a chip movement in the transition being built.
    fn entry_key(&self, seat: SeatIndex, entry_type: EntryType) -> String {
        format!(
            "{}-r{}-v{}-p{}-{}",
            self.room_id,
            self.rounds_played,
            self.version + 1,
            self.players[seat].player_id,
            entry_type
        )
    }
}

/// Stacks plus any pot not yet awarded. Constant across a game.
#[must_use]
pub fn chips_in_play(engine: &RoundEngine) -> u64 {
    let stacks: u64 = engine.players().iter().map(|p| u64::from(p.chips)).sum();
    if engine.pot_awarded() {
        stacks
    } else {
        stacks + u64::from(engine.pot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Outcome;

    fn question() -> Question {
        Question {
            id: 11,
            prompt: "How many keys on a standard piano?".to_string(),
            hints: ["More than 80".to_string(), "Fewer than 90".to_string()],
            correct_answer: 88.0,
            difficulty: 1,
        }
    }

    /// Room with `n` players (ids 100, 101, ...) and the game started.
    fn started(n: usize, settings: GameSettings) -> RoundEngine {
        let mut engine = RoundEngine::new(1, settings);
        for i in 0..n {
            let id = 100 + i as PlayerId;
            engine
                .seat_player(id, format!("player{i}").into(), None)
                .unwrap();
        }
        engine.start_game(100, question(), Utc::now()).unwrap();
        engine
    }

    fn host_only_betting() -> GameSettings {
        GameSettings {
            advance_when_all_estimated: false,
            ..Default::default()
        }
    }

    fn id(seat: SeatIndex) -> PlayerId {
        100 + seat as PlayerId
    }

    fn to_betting1(engine: &mut RoundEngine) {
        let round = engine.round_number();
        engine.countdown_elapsed(round).unwrap();
        assert_eq!(engine.stage(), Some(Stage::Betting1));
    }

    fn act(engine: &mut RoundEngine, seat: SeatIndex, command: Command) -> GameResult<Transition> {
        engine.handle(id(seat), command, None, Utc::now())
    }

    fn pot_matches_contributions(engine: &RoundEngine) {
        let contributed: Chips = engine.players().iter().map(|p| p.contribution).sum();
        assert_eq!(engine.pot(), contributed);
    }

    #[test]
    fn test_blinds_posted_at_round_start() {
        let engine = started(3, host_only_betting());
        assert_eq!(engine.stage(), Some(Stage::Question));
        assert_eq!(engine.pot(), 15);
        assert_eq!(engine.table_bet(), 10);
        assert_eq!(engine.players()[0].chips, 495);
        assert_eq!(engine.players()[1].chips, 490);
        assert_eq!(engine.players()[2].chips, 500);
        // Nobody acts while estimates are collected.
        assert_eq!(engine.turn(), None);
        assert!(engine.countdown_deadline().is_some());
        pot_matches_contributions(&engine);
    }

    #[test]
    fn test_three_player_call_scenario() {
        let mut engine = started(3, host_only_betting());
        to_betting1(&mut engine);
        assert_eq!(engine.turn(), Some(2));

        let tx = act(&mut engine, 2, Command::Call).unwrap();
        assert_eq!(engine.pot(), 25);
        assert_eq!(engine.players()[2].chips, 490);
        assert_eq!(tx.ledger.len(), 1);
        assert_eq!(tx.ledger[0].amount, -10);
        assert_eq!(engine.stage(), Some(Stage::Betting1));

        // Blind posters still have to act.
        assert!(!engine.is_betting_complete());
        assert_eq!(engine.turn(), Some(0));
        act(&mut engine, 0, Command::Call).unwrap();
        act(&mut engine, 1, Command::Call).unwrap();

        assert!(engine.is_betting_complete());
        assert_eq!(engine.turn(), None);
        assert_eq!(engine.stage(), Some(Stage::Betting1));
        assert_eq!(engine.pot(), 30);

        act(&mut engine, 0, Command::AdvanceStage { from: None }).unwrap();
        assert_eq!(engine.stage(), Some(Stage::Hint1));
        pot_matches_contributions(&engine);
    }

    #[test]
    fn test_no_premature_advance() {
        let mut engine = started(3, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 2, Command::Call).unwrap();

        let err = act(&mut engine, 0, Command::AdvanceStage { from: None }).unwrap_err();
        assert_eq!(err.rejection(), Some(&CommandRejection::BettingIncomplete));
        assert_eq!(engine.stage(), Some(Stage::Betting1));
    }

    #[test]
    fn test_advance_is_not_repeatable() {
        let mut engine = started(2, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 0, Command::Call).unwrap();
        act(&mut engine, 1, Command::Call).unwrap();

        act(&mut engine, 0, Command::AdvanceStage { from: None }).unwrap();
        act(&mut engine, 0, Command::AdvanceStage { from: None }).unwrap();
        assert_eq!(engine.stage(), Some(Stage::Betting2));

        // Second click from a racing host client hits an open betting stage.
        let err = act(&mut engine, 0, Command::AdvanceStage { from: None }).unwrap_err();
        assert_eq!(err.rejection(), Some(&CommandRejection::BettingIncomplete));
    }

    #[test]
    fn test_later_betting_stage_resets_bets() {
        let mut engine = started(2, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 0, Command::Call).unwrap();
        act(&mut engine, 1, Command::Call).unwrap();
        act(&mut engine, 0, Command::AdvanceStage { from: None }).unwrap();
        act(&mut engine, 0, Command::AdvanceStage { from: None }).unwrap();

        assert_eq!(engine.stage(), Some(Stage::Betting2));
        assert_eq!(engine.table_bet(), 0);
        assert!(engine.players().iter().all(|p| p.bet == 0));
        assert_eq!(engine.turn(), Some(0));
        assert_eq!(engine.pot(), 20);

        let tx = act(&mut engine, 0, Command::Call).unwrap();
        assert_eq!(tx.events, vec![GameEvent::Checked { seat: 0 }]);
        assert!(tx.ledger.is_empty());
    }

    #[test]
    fn test_raise_reopens_action() {
        let mut engine = started(3, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 2, Command::Call).unwrap();
        act(&mut engine, 0, Command::Call).unwrap();

        act(&mut engine, 1, Command::Raise { increment: Some(20) }).unwrap();
        assert_eq!(engine.table_bet(), 30);
        assert_eq!(engine.players()[1].bet, 30);
        assert_eq!(engine.turn(), Some(2));
        assert!(!engine.is_betting_complete());

        act(&mut engine, 2, Command::Call).unwrap();
        act(&mut engine, 0, Command::Call).unwrap();
        assert!(engine.is_betting_complete());
        assert_eq!(engine.pot(), 90);
        pot_matches_contributions(&engine);
    }

    #[test]
    fn test_raise_increment_floor() {
        let mut engine = started(2, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 0, Command::Raise { increment: Some(1) }).unwrap();
        assert_eq!(engine.table_bet(), 20);
    }

    #[test]
    fn test_short_stack_call_is_all_in() {
        let settings = GameSettings {
            starting_stake: 30,
            advance_when_all_estimated: false,
            ..Default::default()
        };
        let mut engine = started(2, settings);
        to_betting1(&mut engine);
        act(&mut engine, 0, Command::Raise { increment: Some(40) }).unwrap();
        assert_eq!(engine.players()[0].chips, 0);
        assert_eq!(engine.table_bet(), 30);

        act(&mut engine, 1, Command::Call).unwrap();
        assert_eq!(engine.players()[1].chips, 0);
        assert!(engine.is_betting_complete());
    }

    #[test]
    fn test_empty_stack_cannot_raise() {
        let settings = GameSettings {
            starting_stake: 10,
            advance_when_all_estimated: false,
            ..Default::default()
        };
        let mut engine = started(3, settings);
        to_betting1(&mut engine);
        act(&mut engine, 2, Command::Call).unwrap();
        assert_eq!(engine.turn(), Some(0));

        act(&mut engine, 0, Command::Call).unwrap();
        // Seat 1 posted the whole stack as big blind.
        let err = act(&mut engine, 1, Command::Raise { increment: None }).unwrap_err();
        assert_eq!(err.rejection(), Some(&CommandRejection::CannotRaise));
        act(&mut engine, 1, Command::Call).unwrap();
        assert!(engine.is_betting_complete());
    }

    #[test]
    fn test_out_of_turn_rejected() {
        let mut engine = started(3, host_only_betting());
        to_betting1(&mut engine);
        let version = engine.version();

        let err = act(&mut engine, 0, Command::Fold).unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&CommandRejection::NotYourTurn { expected: Some(2) })
        );
        assert_eq!(engine.version(), version);
        assert!(!engine.players()[0].folded);
    }

    #[test]
    fn test_fold_keeps_committed_chips() {
        let mut engine = started(3, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 2, Command::Call).unwrap();
        act(&mut engine, 0, Command::Fold).unwrap();

        assert!(engine.players()[0].folded);
        assert_eq!(engine.players()[0].chips, 495);
        assert_eq!(engine.players()[0].bet, 5);
        assert_eq!(engine.pot(), 25);
        assert_eq!(engine.turn(), Some(1));
    }

    #[test]
    fn test_duplicate_fold_is_noop() {
        let mut engine = started(3, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 2, Command::Fold).unwrap();
        let after_once = engine.snapshot();

        assert!(act(&mut engine, 2, Command::Fold).is_err());
        assert_eq!(engine.snapshot(), after_once);
    }

    #[test]
    fn test_last_player_standing_takes_pot() {
        let mut engine = started(4, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 2, Command::Fold).unwrap();
        act(&mut engine, 3, Command::Fold).unwrap();
        let tx = act(&mut engine, 0, Command::Fold).unwrap();

        assert_eq!(engine.stage(), Some(Stage::Results));
        assert!(engine.pot_awarded());
        assert_eq!(engine.players()[1].chips, 505);

        let result = tx.result.unwrap();
        assert_eq!(result.outcome, Outcome::LastStanding);
        assert_eq!(result.winner_seat(), Some(1));
        assert_eq!(result.pot, 15);
        assert_eq!(result.games_played.len(), 4);
        assert_eq!(result.games_won, vec![id(1)]);
        assert_eq!(chips_in_play(&engine), 2000);
    }

    #[test]
    fn test_estimates_close_question_stage() {
        let mut engine = started(2, GameSettings::default());
        act(
            &mut engine,
            0,
            Command::SubmitEstimate { value: 80.0 },
        )
        .unwrap();
        assert_eq!(engine.stage(), Some(Stage::Question));

        let err = act(&mut engine, 0, Command::SubmitEstimate { value: 81.0 }).unwrap_err();
        assert_eq!(err.rejection(), Some(&CommandRejection::AlreadySubmitted));

        act(&mut engine, 1, Command::SubmitEstimate { value: 95.0 }).unwrap();
        assert_eq!(engine.stage(), Some(Stage::Betting1));
        assert_eq!(engine.countdown_deadline(), None);
    }

    #[test]
    fn test_non_finite_estimate_rejected() {
        let mut engine = started(2, GameSettings::default());
        let err = act(&mut engine, 0, Command::SubmitEstimate { value: f64::NAN }).unwrap_err();
        assert_eq!(err.rejection(), Some(&CommandRejection::InvalidEstimate));
    }

    #[test]
    fn test_stale_countdown_ignored() {
        let mut engine = started(2, GameSettings::default());
        act(&mut engine, 0, Command::SubmitEstimate { value: 1.0 }).unwrap();
        act(&mut engine, 1, Command::SubmitEstimate { value: 2.0 }).unwrap();

        let err = engine.countdown_elapsed(1).unwrap_err();
        assert_eq!(err.rejection(), Some(&CommandRejection::StaleCountdown(1)));
        assert_eq!(engine.stage(), Some(Stage::Betting1));
    }

    #[test]
    fn test_advance_rejected_in_question_stage() {
        let mut engine = started(2, GameSettings::default());
        let err = act(&mut engine, 0, Command::AdvanceStage { from: None }).unwrap_err();
        assert!(matches!(
            err.rejection(),
            Some(CommandRejection::WrongStage {
                stage: Stage::Question,
                ..
            })
        ));
    }

    #[test]
    fn test_only_host_advances() {
        let mut engine = started(2, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 0, Command::Call).unwrap();
        act(&mut engine, 1, Command::Call).unwrap();

        let err = act(&mut engine, 1, Command::AdvanceStage { from: None }).unwrap_err();
        assert_eq!(err.rejection(), Some(&CommandRejection::NotHost));
    }

    /// Plays every remaining stage with checks/calls and host advances.
    fn play_out(engine: &mut RoundEngine) -> Option<RoundResult> {
        while engine.stage() != Some(Stage::Results) {
            if let Some(seat) = engine.turn() {
                let tx = act(engine, seat, Command::Call).unwrap();
                if tx.result.is_some() {
                    return tx.result;
                }
            } else {
                let tx = act(engine, 0, Command::AdvanceStage { from: None }).unwrap();
                if tx.result.is_some() {
                    return tx.result;
                }
            }
        }
        None
    }

    #[test]
    fn test_closest_estimate_wins_with_lowest_seat_tie_break() {
        let mut engine = started(3, GameSettings::default());
        let mut question = question();
        question.correct_answer = 12.0;
        engine.round.as_mut().unwrap().question = question;

        act(&mut engine, 0, Command::SubmitEstimate { value: 10.0 }).unwrap();
        act(&mut engine, 1, Command::SubmitEstimate { value: 14.0 }).unwrap();
        act(&mut engine, 2, Command::SubmitEstimate { value: 2.0 }).unwrap();

        let result = play_out(&mut engine).unwrap();
        assert_eq!(result.outcome, Outcome::Closest);
        assert_eq!(result.winner_seat(), Some(0));
        assert_eq!(result.pot, 30);
        assert_eq!(result.distances[0].distance, Some(2.0));
        assert_eq!(result.distances[1].distance, Some(2.0));
        assert_eq!(engine.players()[0].chips, 520);
        assert_eq!(chips_in_play(&engine), 1500);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.correct_answer, Some(12.0));
        assert_eq!(snapshot.players[2].estimate, Some(2.0));
    }

    #[test]
    fn test_no_estimates_splits_pot() {
        let mut engine = started(3, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 2, Command::Raise { increment: Some(11) }).unwrap();

        let result = play_out(&mut engine).unwrap();
        assert_eq!(result.outcome, Outcome::NoEstimates);
        assert_eq!(result.pot, 63);
        assert_eq!(result.awards.iter().map(|a| a.amount).sum::<Chips>(), 63);
        assert_eq!(result.games_won.len(), 3);
        assert_eq!(chips_in_play(&engine), 1500);
    }

    #[test]
    fn test_hints_revealed_progressively() {
        let mut engine = started(2, host_only_betting());
        assert!(engine.snapshot().hints.is_empty());
        to_betting1(&mut engine);
        act(&mut engine, 0, Command::Call).unwrap();
        act(&mut engine, 1, Command::Call).unwrap();
        act(&mut engine, 0, Command::AdvanceStage { from: None }).unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.stage, Some(Stage::Hint1));
        assert_eq!(snapshot.hints, vec!["More than 80".to_string()]);
        assert_eq!(snapshot.correct_answer, None);
    }

    #[test]
    fn test_auto_advance_betting() {
        let settings = GameSettings {
            auto_advance_betting: true,
            advance_when_all_estimated: false,
            ..Default::default()
        };
        let mut engine = started(2, settings);
        to_betting1(&mut engine);
        act(&mut engine, 0, Command::Call).unwrap();
        let tx = act(&mut engine, 1, Command::Call).unwrap();

        assert_eq!(engine.stage(), Some(Stage::Hint1));
        assert!(tx.events.contains(&GameEvent::StageAdvanced {
            from: Stage::Betting1,
            to: Stage::Hint1,
        }));
    }

    #[test]
    fn test_start_new_round_needs_question() {
        let mut engine = started(2, host_only_betting());
        to_betting1(&mut engine);
        act(&mut engine, 0, Command::Fold).unwrap();
        assert_eq!(engine.stage(), Some(Stage::Results));

        assert!(engine.requires_question(id(0), &Command::StartNewRound).unwrap());
        let version = engine.version();
        let err = act(&mut engine, 0, Command::StartNewRound).unwrap_err();
        assert!(matches!(err, GameError::NoQuestionAvailable(_)));
        assert_eq!(engine.version(), version);
        assert_eq!(engine.stage(), Some(Stage::Results));

        engine
            .handle(id(0), Command::StartNewRound, Some(question()), Utc::now())
            .unwrap();
        assert_eq!(engine.round_number(), 2);
        assert_eq!(engine.stage(), Some(Stage::Question));
        assert_eq!(engine.pot(), 15);
        assert!(engine.players().iter().all(|p| !p.folded));
    }

    #[test]
    fn test_room_completes_when_one_player_has_chips() {
        let settings = GameSettings {
            starting_stake: 10,
            advance_when_all_estimated: false,
            ..Default::default()
        };
        let mut engine = started(2, settings);
        to_betting1(&mut engine);
        // Seat 0 folds; seat 1 takes 15 and seat 0 is left with 5.
        act(&mut engine, 0, Command::Fold).unwrap();
        assert_eq!(engine.players()[0].chips, 5);

        engine
            .handle(id(0), Command::StartNewRound, Some(question()), Utc::now())
            .unwrap();
        assert_eq!(engine.players()[0].chips, 0);
        to_betting1(&mut engine);
        act(&mut engine, 0, Command::Fold).unwrap();

        assert!(!engine.requires_question(id(0), &Command::StartNewRound).unwrap());
        let tx = act(&mut engine, 0, Command::StartNewRound).unwrap();
        assert_eq!(tx.events, vec![GameEvent::RoomCompleted]);
        assert_eq!(engine.lifecycle(), RoomLifecycle::Completed);
    }

    #[test]
    fn test_seating_rules() {
        let mut engine = RoundEngine::new(
            9,
            GameSettings {
                capacity: 2,
                ..Default::default()
            },
        );
        let tx = engine.seat_player(1, "a".into(), None).unwrap();
        assert_eq!(tx.ledger.len(), 1);
        assert_eq!(tx.ledger[0].entry_type, EntryType::BuyIn);
        assert_eq!(engine.host(), Some(1));

        let err = engine.seat_player(1, "a".into(), None).unwrap_err();
        assert_eq!(err.rejection(), Some(&CommandRejection::AlreadySeated(1)));

        let tx = engine.seat_player(2, "b".into(), Some(42)).unwrap();
        assert!(tx.ledger.is_empty());
        assert_eq!(engine.player(2).unwrap().chips, 42);

        let err = engine.seat_player(3, "c".into(), None).unwrap_err();
        assert_eq!(err.rejection(), Some(&CommandRejection::RoomFull));
    }

    #[test]
    fn test_host_leaving_passes_host() {
        let mut engine = RoundEngine::new(1, GameSettings::default());
        engine.seat_player(1, "a".into(), None).unwrap();
        engine.seat_player(2, "b".into(), None).unwrap();
        engine.seat_player(3, "c".into(), None).unwrap();

        engine.remove_player(1).unwrap();
        assert_eq!(engine.host(), Some(2));
        assert_eq!(engine.player(3).unwrap().seat, 1);
    }

    #[test]
    fn test_start_game_checks() {
        let mut engine = RoundEngine::new(1, GameSettings::default());
        engine.seat_player(1, "a".into(), None).unwrap();
        let err = engine.start_game(1, question(), Utc::now()).unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&CommandRejection::NotEnoughPlayers { required: 2 })
        );

        engine.seat_player(2, "b".into(), None).unwrap();
        let err = engine.start_game(2, question(), Utc::now()).unwrap_err();
        assert_eq!(err.rejection(), Some(&CommandRejection::NotHost));

        engine.start_game(1, question(), Utc::now()).unwrap();
        let err = engine.seat_player(3, "c".into(), None).unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&CommandRejection::WrongLifecycle(RoomLifecycle::InProgress))
        );
    }

    #[test]
    fn test_closed_room_rejects_commands() {
        let mut engine = started(2, host_only_betting());
        engine.close(100).unwrap();
        let err = act(&mut engine, 0, Command::SubmitEstimate { value: 1.0 }).unwrap_err();
        assert_eq!(
            err.rejection(),
            Some(&CommandRejection::WrongLifecycle(RoomLifecycle::Closed))
        );
    }

    #[test]
    fn test_ledger_keys_unique_within_round() {
        let mut engine = started(3, host_only_betting());
        to_betting1(&mut engine);
        let mut keys = Vec::new();
        for _ in 0..6 {
            let Some(seat) = engine.turn() else { break };
            let tx = act(&mut engine, seat, Command::Raise { increment: None }).unwrap();
            keys.extend(tx.ledger.into_iter().map(|e| e.idempotency_key));
        }
        let mut deduped = keys.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), keys.len());
    }

    #[test]
    fn test_largest_valid_stakes_go_all_in_without_overflow() {
        let stake = Chips::MAX / 6;
        let settings = GameSettings {
            capacity: 6,
            starting_stake: stake,
            ..host_only_betting()
        };
        assert!(settings.validate().is_ok());
        let mut engine = started(6, settings);
        to_betting1(&mut engine);

        while let Some(seat) = engine.turn() {
            act(&mut engine, seat, Command::Raise { increment: Some(Chips::MAX) }).unwrap();
        }
        assert_eq!(u64::from(engine.pot()), 6 * u64::from(stake));
        assert!(engine.players().iter().all(|p| p.chips == 0));
        pot_matches_contributions(&engine);

        for _ in 0..64 {
            if engine.stage() == Some(Stage::Results) {
                break;
            }
            match engine.turn() {
                Some(seat) => act(&mut engine, seat, Command::Call).unwrap(),
                None => act(&mut engine, 0, Command::AdvanceStage { from: None }).unwrap(),
            };
        }
        assert_eq!(engine.stage(), Some(Stage::Results));
        assert_eq!(chips_in_play(&engine), 6 * u64::from(stake));
    }
}
