//! Room manager for spawning and addressing room actors.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{RwLock, mpsc, oneshot};
use uuid::Uuid;

use super::{
    actor::{RoomActor, RoomHandle},
    config::RoomConfig,
    errors::{RoomError, RoomResult},
    messages::{RoomEvent, RoomMessage, RoomResponse, RoomSummary},
};
use crate::{
    db::StoreWriter,
    game::entities::{Command, CommandToken, PlayerId, RoomId, RoundStateSnapshot},
    ledger::ChipLedger,
    question::QuestionSource,
};

/// Registry of live rooms. Cheap to clone.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<RwLock<HashMap<RoomId, RoomHandle>>>,
    next_room_id: Arc<AtomicI64>,
    questions: Arc<dyn QuestionSource>,
    ledger: ChipLedger,
    store: Option<StoreWriter>,
}

impl RoomManager {
    pub fn new(questions: Arc<dyn QuestionSource>, ledger: ChipLedger) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            next_room_id: Arc::new(AtomicI64::new(1)),
            questions,
            ledger,
            store: None,
        }
    }

    /// Persist every commit through `store`.
    pub fn with_store(mut self, store: StoreWriter) -> Self {
        self.store = Some(store);
        self
    }

    /// Allocate room ids from `first` on, past any rooms already persisted.
    pub fn starting_at(self, first: RoomId) -> Self {
        self.next_room_id.store(first, Ordering::Relaxed);
        self
    }

    pub fn ledger(&self) -> &ChipLedger {
        &self.ledger
    }

    /// Create and spawn a new room
    pub async fn create_room(&self, config: RoomConfig) -> RoomResult<RoomId> {
        config.validate().map_err(RoomError::InvalidConfig)?;

        let room_id = self.next_room_id.fetch_add(1, Ordering::Relaxed);
        let (actor, handle) = RoomActor::new(
            room_id,
            config,
            Arc::clone(&self.questions),
            self.ledger.clone(),
            self.store.clone(),
        );

        self.rooms.write().await.insert(room_id, handle);
        tokio::spawn(actor.run());

        log::info!("Created room {}", room_id);
        Ok(room_id)
    }

    /// Get a room handle
    pub async fn get_room(&self, room_id: RoomId) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(&room_id).cloned()
    }

    /// Number of live rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Summaries of every live room, by id.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            let room_id = handle.room_id();
            if let Ok(summary) = self
                .request(room_id, |response| RoomMessage::GetSummary { response })
                .await
            {
                summaries.push(summary);
            }
        }
        summaries.sort_by_key(|s| s.room_id);
        summaries
    }

    pub async fn join(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        name: String,
    ) -> RoomResult<RoomResponse> {
        self.request(room_id, |response| RoomMessage::Join {
            player_id,
            name,
            response,
        })
        .await
    }

    pub async fn leave(&self, room_id: RoomId, player_id: PlayerId) -> RoomResult<RoomResponse> {
        self.request(room_id, |response| RoomMessage::Leave {
            player_id,
            response,
        })
        .await
    }

    pub async fn start_game(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        token: CommandToken,
    ) -> RoomResult<RoomResponse> {
        self.request(room_id, |response| RoomMessage::StartGame {
            player_id,
            token,
            response,
        })
        .await
    }

    /// Forward a game command to the room's coordinator.
    pub async fn command(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        token: CommandToken,
        command: Command,
    ) -> RoomResult<RoomResponse> {
        self.request(room_id, |response| RoomMessage::Command {
            player_id,
            token,
            command,
            response,
        })
        .await
    }

    /// Close a room. The handle is dropped once the host's close commits.
    pub async fn close(&self, room_id: RoomId, player_id: PlayerId) -> RoomResult<RoomResponse> {
        let response = self
            .request(room_id, |response| RoomMessage::Close {
                player_id,
                response,
            })
            .await?;

        if response.is_success() {
            self.rooms.write().await.remove(&room_id);
            log::info!("Closed room {}", room_id);
        }
        Ok(response)
    }

    pub async fn snapshot(&self, room_id: RoomId) -> RoomResult<Arc<RoundStateSnapshot>> {
        self.request(room_id, |response| RoomMessage::GetSnapshot { response })
            .await
    }

    /// Subscribe to a room's events. The first event is the current snapshot.
    pub async fn subscribe(
        &self,
        room_id: RoomId,
        subscriber_id: Uuid,
        sender: mpsc::Sender<RoomEvent>,
    ) -> RoomResult<()> {
        let handle = self.live_handle(room_id).await?;
        handle
            .send(RoomMessage::Subscribe {
                subscriber_id,
                sender,
            })
            .await
            .map_err(|_| RoomError::RoomStopped(room_id))
    }

    pub async fn unsubscribe(&self, room_id: RoomId, subscriber_id: Uuid) {
        if let Some(handle) = self.get_room(room_id).await {
            let _ = handle
                .send(RoomMessage::Unsubscribe { subscriber_id })
                .await;
        }
    }

    async fn live_handle(&self, room_id: RoomId) -> RoomResult<RoomHandle> {
        let handle = self
            .get_room(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;

        if handle.is_closed() {
            self.rooms.write().await.remove(&room_id);
            return Err(RoomError::RoomStopped(room_id));
        }
        Ok(handle)
    }

    /// Send a message built around a fresh reply channel and wait for the
    /// answer.
    async fn request<T>(
        &self,
        room_id: RoomId,
        message: impl FnOnce(oneshot::Sender<T>) -> RoomMessage,
    ) -> RoomResult<T> {
        let handle = self.live_handle(room_id).await?;
        let (tx, rx) = oneshot::channel();

        handle
            .send(message(tx))
            .await
            .map_err(|_| RoomError::RoomStopped(room_id))?;

        rx.await.map_err(|_| RoomError::RoomStopped(room_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::StaticQuestionSource;

    fn manager() -> RoomManager {
        RoomManager::new(Arc::new(StaticQuestionSource::default()), ChipLedger::new())
    }

    #[tokio::test]
    async fn test_room_ids_start_where_told() {
        let manager = manager().starting_at(40);

        let first = manager.create_room(RoomConfig::default()).await.unwrap();
        let second = manager.create_room(RoomConfig::default()).await.unwrap();

        assert_eq!((first, second), (40, 41));
        assert_eq!(manager.room_count().await, 2);
        let listed: Vec<RoomId> = manager.list_rooms().await.iter().map(|s| s.room_id).collect();
        assert_eq!(listed, vec![40, 41]);
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let manager = manager();
        assert_eq!(
            manager.snapshot(7).await.unwrap_err(),
            RoomError::RoomNotFound(7)
        );
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let manager = manager();
        let config = RoomConfig {
            name: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            manager.create_room(config).await,
            Err(RoomError::InvalidConfig(_))
        ));
        assert_eq!(manager.room_count().await, 0);
    }
}
