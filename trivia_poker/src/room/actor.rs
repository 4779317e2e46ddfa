//! Room actor: the single writer for one room's engine state.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};
use uuid::Uuid;

use super::{
    config::RoomConfig,
    messages::{RoomEvent, RoomMessage, RoomResponse, RoomSummary},
};
use crate::{
    db::{CommitRecord, StoreWriter},
    game::{
        GameError, GameResult, RoundEngine, Transition,
        entities::{Command, CommandToken, PlayerId, RoomId, RoomLifecycle, RoundStateSnapshot},
    },
    ledger::ChipLedger,
    question::QuestionSource,
};

/// Mailbox depth per room.
const INBOX_CAPACITY: usize = 100;

/// How many command tokens each room remembers.
pub const TOKEN_CACHE_SIZE: usize = 256;

/// Room actor handle for sending messages
#[derive(Clone, Debug)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    room_id: RoomId,
}

impl RoomHandle {
    pub fn new(sender: mpsc::Sender<RoomMessage>, room_id: RoomId) -> Self {
        Self { sender, room_id }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a message to the room
    pub async fn send(&self, message: RoomMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .await
            .map_err(|_| "Room is closed".to_string())
    }
}

/// Recently seen command tokens and what they were answered with. Tokens are
/// scoped to the player who sent them.
#[derive(Debug, Default)]
struct TokenCache {
    responses: HashMap<(PlayerId, CommandToken), RoomResponse>,
    order: VecDeque<(PlayerId, CommandToken)>,
}

impl TokenCache {
    fn get(&self, player_id: PlayerId, token: &CommandToken) -> Option<RoomResponse> {
        let key = (player_id, token.clone());
        self.responses.get(&key).map(|response| match response {
            RoomResponse::Accepted { version } => RoomResponse::Duplicate { version: *version },
            other => other.clone(),
        })
    }

    fn insert(&mut self, player_id: PlayerId, token: CommandToken, response: RoomResponse) {
        let key = (player_id, token);
        if self.responses.insert(key.clone(), response).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > TOKEN_CACHE_SIZE {
            if let Some(oldest) = self.order.pop_front() {
                self.responses.remove(&oldest);
            }
        }
    }
}

/// Room actor managing a single room
pub struct RoomActor {
    id: RoomId,
    config: RoomConfig,
    engine: RoundEngine,
    inbox: mpsc::Receiver<RoomMessage>,
    questions: Arc<dyn QuestionSource>,
    ledger: ChipLedger,
    store: Option<StoreWriter>,
    subscribers: HashMap<Uuid, mpsc::Sender<RoomEvent>>,
    tokens: TokenCache,
    snapshot: Arc<RoundStateSnapshot>,
    /// Round number and instant the question countdown fires.
    countdown: Option<(u32, Instant)>,
    is_closed: bool,
}

impl RoomActor {
    /// Create a new room actor
    ///
    /// # Returns
    ///
    /// * `(RoomActor, RoomHandle)` - Actor and handle for sending messages
    pub fn new(
        id: RoomId,
        config: RoomConfig,
        questions: Arc<dyn QuestionSource>,
        ledger: ChipLedger,
        store: Option<StoreWriter>,
    ) -> (Self, RoomHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let engine = RoundEngine::new(id, config.settings.clone());
        let snapshot = Arc::new(engine.snapshot());

        let actor = Self {
            id,
            config,
            engine,
            inbox,
            questions,
            ledger,
            store,
            subscribers: HashMap::new(),
            tokens: TokenCache::default(),
            snapshot,
            countdown: None,
            is_closed: false,
        };

        (actor, RoomHandle::new(sender, id))
    }

    /// Run the room actor event loop
    pub async fn run(mut self) {
        log::info!("Room {} '{}' starting", self.id, self.config.name);

        while !self.is_closed {
            let countdown = self.countdown;
            tokio::select! {
                message = self.inbox.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    // Every handle dropped.
                    None => break,
                },

                _ = wait_for(countdown.map(|(_, at)| at)) => {
                    if let Some((round_number, _)) = countdown {
                        self.countdown = None;
                        self.handle_countdown(round_number).await;
                    }
                }
            }
        }

        for sender in self.subscribers.values() {
            let _ = sender.try_send(RoomEvent::Closed);
        }
        log::info!("Room {} '{}' stopped", self.id, self.config.name);
    }

    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                player_id,
                name,
                response,
            } => {
                let result = self.handle_join(player_id, name).await;
                let _ = response.send(result);
            }

            RoomMessage::Leave {
                player_id,
                response,
            } => {
                let result = self.engine.remove_player(player_id);
                let result = self.finish(result).await;
                let _ = response.send(result);
            }

            RoomMessage::StartGame {
                player_id,
                token,
                response,
            } => {
                let result = match self.tokens.get(player_id, &token) {
                    Some(cached) => cached,
                    None => {
                        let result = self.handle_start(player_id).await;
                        self.remember(player_id, token, &result);
                        result
                    }
                };
                let _ = response.send(result);
            }

            RoomMessage::Command {
                player_id,
                token,
                command,
                response,
            } => {
                let result = match self.tokens.get(player_id, &token) {
                    Some(cached) => {
                        log::debug!(
                            "Room {}: duplicate token {} from player {}",
                            self.id,
                            token,
                            player_id
                        );
                        cached
                    }
                    None => {
                        let result = self.handle_command(player_id, command).await;
                        self.remember(player_id, token, &result);
                        result
                    }
                };
                let _ = response.send(result);
            }

            RoomMessage::Close {
                player_id,
                response,
            } => {
                let result = self.engine.close(player_id);
                let result = self.finish(result).await;
                let _ = response.send(result);
            }

            RoomMessage::GetSnapshot { response } => {
                let _ = response.send(Arc::clone(&self.snapshot));
            }

            RoomMessage::GetSummary { response } => {
                let _ = response.send(self.summary());
            }

            RoomMessage::Subscribe {
                subscriber_id,
                sender,
            } => {
                // New viewers start from the current state.
                if sender
                    .try_send(RoomEvent::Snapshot(Arc::clone(&self.snapshot)))
                    .is_ok()
                {
                    self.subscribers.insert(subscriber_id, sender);
                    log::debug!("Subscriber {} watching room {}", subscriber_id, self.id);
                }
            }

            RoomMessage::Unsubscribe { subscriber_id } => {
                self.subscribers.remove(&subscriber_id);
                log::debug!("Subscriber {} left room {}", subscriber_id, self.id);
            }
        }
    }

    async fn handle_join(&mut self, player_id: PlayerId, name: String) -> RoomResponse {
        let persisted = self.ledger.balance(self.id, player_id).await;
        let result = self.engine.seat_player(player_id, name.into(), persisted);
        self.finish(result).await
    }

    async fn handle_start(&mut self, player_id: PlayerId) -> RoomResponse {
        if let Err(e) = self.engine.check_start_game(player_id) {
            return self.reject(player_id, e);
        }
        let question = match self.draw_question().await {
            Ok(question) => question,
            Err(e) => return self.reject(player_id, e),
        };
        let result = self.engine.start_game(player_id, question, Utc::now());
        self.finish(result).await
    }

    async fn handle_command(&mut self, player_id: PlayerId, command: Command) -> RoomResponse {
        let needs_question = match self.engine.requires_question(player_id, &command) {
            Ok(needs) => needs,
            Err(e) => return self.reject(player_id, e),
        };

        let question = if needs_question {
            match self.draw_question().await {
                Ok(question) => Some(question),
                Err(e) => return self.reject(player_id, e),
            }
        } else {
            None
        };

        let result = self.engine.handle(player_id, command, question, Utc::now());
        self.finish(result).await
    }

    async fn handle_countdown(&mut self, round_number: u32) {
        match self.engine.countdown_elapsed(round_number) {
            Ok(tx) => self.commit(tx).await,
            Err(e) => log::debug!("Room {}: {}", self.id, e),
        }
    }

    async fn draw_question(&self) -> GameResult<crate::question::Question> {
        let exclude = self.engine.question().map(|q| q.id);
        self.questions.draw(exclude).await.map_err(|e| {
            log::warn!("Room {}: question source failed: {}", self.id, e);
            GameError::NoQuestionAvailable(e.client_message())
        })
    }

    fn remember(&mut self, player_id: PlayerId, token: CommandToken, response: &RoomResponse) {
        // A missing question is transient; let the same token retry.
        if let RoomResponse::Rejected(GameError::NoQuestionAvailable(_)) = response {
            return;
        }
        self.tokens.insert(player_id, token, response.clone());
    }

    fn reject(&self, player_id: PlayerId, error: GameError) -> RoomResponse {
        log::debug!(
            "Room {}: rejected command from player {}: {}",
            self.id,
            player_id,
            error
        );
        RoomResponse::Rejected(error)
    }

    async fn finish(&mut self, result: GameResult<Transition>) -> RoomResponse {
        match result {
            Ok(tx) => {
                self.commit(tx).await;
                RoomResponse::Accepted {
                    version: self.engine.version(),
                }
            }
            Err(e) => RoomResponse::Rejected(e),
        }
    }

    /// Side effects of a committed transition, in order: ledger, storage,
    /// countdown, broadcast.
    async fn commit(&mut self, tx: Transition) {
        let Transition {
            events,
            ledger,
            result,
        } = tx;

        for event in &events {
            log::debug!("Room {} v{}: {}", self.id, self.engine.version(), event);
        }

        if !ledger.is_empty() {
            if let Err(e) = self.ledger.record(&ledger).await {
                log::error!("Room {}: ledger rejected committed deltas: {}", self.id, e);
            }
        }

        if let Some(store) = &self.store {
            store.submit(CommitRecord::capture(&self.config.name, &self.engine, ledger));
        }

        self.countdown = self.engine.countdown_deadline().map(|deadline| {
            let remaining = (deadline - Utc::now()).to_std().unwrap_or_default();
            (self.engine.round_number(), Instant::now() + remaining)
        });

        self.snapshot = Arc::new(self.engine.snapshot());
        self.broadcast(RoomEvent::Snapshot(Arc::clone(&self.snapshot)));
        if let Some(result) = result {
            self.broadcast(RoomEvent::RoundResult(Arc::new(result)));
        }

        if self.engine.lifecycle() == RoomLifecycle::Closed {
            self.is_closed = true;
        }
    }

    /// Fire-and-forget delivery. Full channels drop the event; viewers
    /// recover through the snapshot poll.
    fn broadcast(&mut self, event: RoomEvent) {
        let room_id = self.id;
        self.subscribers
            .retain(|subscriber_id, sender| match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!(
                        "Room {}: subscriber {} channel full, dropping event",
                        room_id,
                        subscriber_id
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!(
                        "Room {}: subscriber {} disconnected, removing",
                        room_id,
                        subscriber_id
                    );
                    false
                }
            });
    }

    fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.id,
            name: self.config.name.clone(),
            lifecycle: self.engine.lifecycle(),
            player_count: self.engine.players().len(),
            capacity: self.config.settings.capacity,
            blinds: self.engine.blinds(),
            starting_stake: self.config.settings.starting_stake,
            round_number: self.engine.round_number(),
            stage: self.engine.stage(),
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
