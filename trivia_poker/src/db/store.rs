//! Persisted room state: row types, the `RoomStore` seam and its
//! in-memory and PostgreSQL implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};

use crate::game::{
    RoundEngine, Stage,
    entities::{Chips, PlayerId, RoomId, RoomLifecycle, SeatIndex},
};
use crate::ledger::LedgerEntry;
use crate::question::QuestionId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A value doesn't fit its column
    #[error("Value out of range for {column}: {value}")]
    OutOfRange { column: &'static str, value: String },
}

impl StoreError {
    pub fn client_message(&self) -> String {
        "Storage unavailable".to_string()
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One row per room: the room settings plus the live round attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomRow {
    pub room_id: RoomId,
    pub name: String,
    pub capacity: usize,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub starting_stake: Chips,
    pub lifecycle: RoomLifecycle,
    pub round_number: u32,
    pub stage: Option<Stage>,
    pub pot: Chips,
    pub pot_awarded: bool,
    pub table_bet: Chips,
    pub turn: Option<SeatIndex>,
    pub countdown_deadline: Option<DateTime<Utc>>,
    pub version: u64,
}

/// One row per seated player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub name: String,
    pub seat: SeatIndex,
    pub chips: Chips,
    pub bet: Chips,
    pub contribution: Chips,
    pub folded: bool,
    pub estimate: Option<f64>,
    pub is_host: bool,
}

/// The question bound to the room's current round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionRow {
    pub room_id: RoomId,
    pub round_number: u32,
    pub question_id: QuestionId,
    pub prompt: String,
    pub hint1: String,
    pub hint2: String,
    pub correct_answer: f64,
    pub difficulty: u8,
}

/// Everything one committed transition writes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub room: RoomRow,
    pub players: Vec<PlayerRow>,
    pub question: Option<QuestionRow>,
    pub ledger: Vec<LedgerEntry>,
}

impl CommitRecord {
    /// Capture the engine's committed state.
    pub fn capture(name: &str, engine: &RoundEngine, ledger: Vec<LedgerEntry>) -> Self {
        let room_id = engine.room_id();
        let settings = engine.settings();

        let room = RoomRow {
            room_id,
            name: name.to_string(),
            capacity: settings.capacity,
            small_blind: settings.small_blind,
            big_blind: settings.big_blind,
            starting_stake: settings.starting_stake,
            lifecycle: engine.lifecycle(),
            round_number: engine.round_number(),
            stage: engine.stage(),
            pot: engine.pot(),
            pot_awarded: engine.pot_awarded(),
            table_bet: engine.table_bet(),
            turn: engine.turn(),
            countdown_deadline: engine.countdown_deadline(),
            version: engine.version(),
        };

        let players = engine
            .players()
            .iter()
            .map(|p| PlayerRow {
                room_id,
                player_id: p.player_id,
                name: p.name.to_string(),
                seat: p.seat,
                chips: p.chips,
                bet: p.bet,
                contribution: p.contribution,
                folded: p.folded,
                estimate: p.estimate,
                is_host: p.is_host,
            })
            .collect();

        let question = engine.question().map(|q| QuestionRow {
            room_id,
            round_number: engine.round_number(),
            question_id: q.id,
            prompt: q.prompt.clone(),
            hint1: q.hints[0].clone(),
            hint2: q.hints[1].clone(),
            correct_answer: q.correct_answer,
            difficulty: q.difficulty,
        });

        Self {
            room,
            players,
            question,
            ledger,
        }
    }
}

/// Writes committed room state to external storage.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Persist one commit. Records for a room arrive in version order.
    async fn persist(&self, record: &CommitRecord) -> StoreResult<()>;
}

/// Keeps the latest record per room. Used by tests and the server's
/// database-less mode.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    rooms: Arc<RwLock<HashMap<RoomId, CommitRecord>>>,
    ledger: Arc<RwLock<Vec<LedgerEntry>>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest(&self, room_id: RoomId) -> Option<CommitRecord> {
        self.rooms.read().await.get(&room_id).cloned()
    }

    pub async fn ledger_entries(&self, room_id: RoomId) -> Vec<LedgerEntry> {
        self.ledger
            .read()
            .await
            .iter()
            .filter(|e| e.room_id == room_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn persist(&self, record: &CommitRecord) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        let stale = rooms
            .get(&record.room.room_id)
            .is_some_and(|prev| prev.room.version >= record.room.version);
        if stale {
            return Ok(());
        }
        rooms.insert(record.room.room_id, record.clone());
        drop(rooms);

        self.ledger.write().await.extend(record.ledger.iter().cloned());
        Ok(())
    }
}

/// Upserts into `rooms`, `room_players`, `room_questions` and appends to
/// `chip_ledger`, all in one transaction per commit.
#[derive(Clone)]
pub struct PgRoomStore {
    pool: Arc<PgPool>,
}

impl PgRoomStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// First room id not used by any persisted room.
    pub async fn next_room_id(&self) -> StoreResult<RoomId> {
        let next: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) + 1 FROM rooms")
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(next)
    }
}

fn to_i32(column: &'static str, value: impl TryInto<i32> + ToString + Copy) -> StoreResult<i32> {
    value.try_into().map_err(|_| StoreError::OutOfRange {
        column,
        value: value.to_string(),
    })
}

fn to_i64(column: &'static str, value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange {
        column,
        value: value.to_string(),
    })
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn persist(&self, record: &CommitRecord) -> StoreResult<()> {
        let room = &record.room;
        let mut tx = self.pool.begin().await?;

        // Older versions never overwrite newer ones.
        sqlx::query(
            r#"
            INSERT INTO rooms (id, name, capacity, small_blind, big_blind, starting_stake,
                               lifecycle, round_number, stage, pot, pot_awarded, table_bet,
                               turn_seat, countdown_deadline, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW())
            ON CONFLICT (id) DO UPDATE SET
                lifecycle = EXCLUDED.lifecycle,
                round_number = EXCLUDED.round_number,
                stage = EXCLUDED.stage,
                pot = EXCLUDED.pot,
                pot_awarded = EXCLUDED.pot_awarded,
                table_bet = EXCLUDED.table_bet,
                turn_seat = EXCLUDED.turn_seat,
                countdown_deadline = EXCLUDED.countdown_deadline,
                version = EXCLUDED.version,
                updated_at = NOW()
            WHERE rooms.version < EXCLUDED.version
            "#,
        )
        .bind(room.room_id)
        .bind(&room.name)
        .bind(to_i32("capacity", room.capacity)?)
        .bind(to_i64("small_blind", u64::from(room.small_blind))?)
        .bind(to_i64("big_blind", u64::from(room.big_blind))?)
        .bind(to_i64("starting_stake", u64::from(room.starting_stake))?)
        .bind(room.lifecycle.to_string())
        .bind(to_i32("round_number", room.round_number)?)
        .bind(room.stage.map(|s| s.to_string()))
        .bind(to_i64("pot", u64::from(room.pot))?)
        .bind(room.pot_awarded)
        .bind(to_i64("table_bet", u64::from(room.table_bet))?)
        .bind(room.turn.map(|t| to_i32("turn_seat", t)).transpose()?)
        .bind(room.countdown_deadline)
        .bind(to_i64("version", room.version)?)
        .execute(&mut *tx)
        .await?;

        let seated: Vec<PlayerId> = record.players.iter().map(|p| p.player_id).collect();
        sqlx::query("DELETE FROM room_players WHERE room_id = $1 AND NOT (player_id = ANY($2))")
            .bind(room.room_id)
            .bind(&seated)
            .execute(&mut *tx)
            .await?;

        for player in &record.players {
            sqlx::query(
                r#"
                INSERT INTO room_players (room_id, player_id, name, seat, chips, bet,
                                          contribution, folded, estimate, is_host)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (room_id, player_id) DO UPDATE SET
                    seat = EXCLUDED.seat,
                    chips = EXCLUDED.chips,
                    bet = EXCLUDED.bet,
                    contribution = EXCLUDED.contribution,
                    folded = EXCLUDED.folded,
                    estimate = EXCLUDED.estimate,
                    is_host = EXCLUDED.is_host
                "#,
            )
            .bind(player.room_id)
            .bind(player.player_id)
            .bind(&player.name)
            .bind(to_i32("seat", player.seat)?)
            .bind(to_i64("chips", u64::from(player.chips))?)
            .bind(to_i64("bet", u64::from(player.bet))?)
            .bind(to_i64("contribution", u64::from(player.contribution))?)
            .bind(player.folded)
            .bind(player.estimate)
            .bind(player.is_host)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(question) = &record.question {
            sqlx::query(
                r#"
                INSERT INTO room_questions (room_id, round_number, question_id, prompt,
                                            hint1, hint2, correct_answer, difficulty)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (room_id) DO UPDATE SET
                    round_number = EXCLUDED.round_number,
                    question_id = EXCLUDED.question_id,
                    prompt = EXCLUDED.prompt,
                    hint1 = EXCLUDED.hint1,
                    hint2 = EXCLUDED.hint2,
                    correct_answer = EXCLUDED.correct_answer,
                    difficulty = EXCLUDED.difficulty
                "#,
            )
            .bind(question.room_id)
            .bind(to_i32("round_number", question.round_number)?)
            .bind(question.question_id)
            .bind(&question.prompt)
            .bind(&question.hint1)
            .bind(&question.hint2)
            .bind(question.correct_answer)
            .bind(i16::from(question.difficulty))
            .execute(&mut *tx)
            .await?;
        }

        for entry in &record.ledger {
            sqlx::query(
                r#"
                INSERT INTO chip_ledger (room_id, player_id, round_number, amount, balance_after,
                                         direction, entry_type, idempotency_key, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (idempotency_key) DO NOTHING
                "#,
            )
            .bind(entry.room_id)
            .bind(entry.player_id)
            .bind(to_i32("round_number", entry.round_number)?)
            .bind(entry.amount)
            .bind(to_i64("balance_after", u64::from(entry.balance_after))?)
            .bind(entry.direction.to_string())
            .bind(entry.entry_type.to_string())
            .bind(&entry.idempotency_key)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Background task that persists commit records in the order they were
/// submitted. Submitting never blocks the caller.
#[derive(Clone)]
pub struct StoreWriter {
    sender: mpsc::UnboundedSender<CommitRecord>,
}

impl StoreWriter {
    /// Spawn the writer task on the current runtime.
    pub fn spawn(store: Arc<dyn RoomStore>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<CommitRecord>();

        tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                if let Err(e) = store.persist(&record).await {
                    log::error!(
                        "Failed to persist room {} version {}: {}",
                        record.room.room_id,
                        record.room.version,
                        e
                    );
                }
            }
            log::debug!("Store writer stopped");
        });

        Self { sender }
    }

    pub fn submit(&self, record: CommitRecord) {
        if self.sender.send(record).is_err() {
            log::warn!("Store writer is gone, dropping commit record");
        }
    }
}
