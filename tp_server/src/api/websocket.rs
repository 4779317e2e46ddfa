//! WebSocket push for room viewers.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/{room_id}`, optionally with
//!    `?player_id=<id>` to send commands over the same socket
//! 2. The connection subscribes to the room; the first message is the
//!    current snapshot
//! 3. Every committed snapshot is pushed as it happens, and the latest one is
//!    pushed again on a fixed interval so a dropped push heals itself
//! 4. On disconnect the subscription is removed; the player keeps their seat
//!
//! # Messages
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws/1?player_id=3');
//! ws.send(JSON.stringify({
//!   type: "command",
//!   token: crypto.randomUUID(),
//!   command: { type: "call" }
//! }));
//! // <- {"type":"snapshot","data":{...}}
//! // <- {"type":"accepted","data":{"version":12}}
//! ```

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use trivia_poker::{
    Command, CommandToken, RoomEvent, RoomResponse, RoundResult, RoundStateSnapshot,
    entities::{PlayerId, RoomId},
};
use uuid::Uuid;

use super::AppState;
use crate::metrics;

/// Room events buffered per connection before pushes are dropped.
const EVENT_BUFFER: usize = 32;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    player_id: Option<PlayerId>,
}

/// Client messages received via WebSocket
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Command {
        token: CommandToken,
        command: Command,
    },
    /// Ask for the latest snapshot right away
    Refresh,
}

/// Messages sent to the client
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum ServerMessage<'a> {
    Snapshot(&'a RoundStateSnapshot),
    RoundResult(&'a RoundResult),
    Closed,
    Accepted { version: u64 },
    Duplicate { version: u64 },
    Error { message: String },
}

impl ServerMessage<'_> {
    fn from_response(response: RoomResponse) -> ServerMessage<'static> {
        match response {
            RoomResponse::Accepted { version } => ServerMessage::Accepted { version },
            RoomResponse::Duplicate { version } => ServerMessage::Duplicate { version },
            RoomResponse::Rejected(e) => ServerMessage::Error {
                message: e.to_string(),
            },
        }
    }

    fn to_text(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::error!("Failed to serialize server message: {}", e);
                None
            }
        }
    }
}

/// Upgrade to a WebSocket viewing `room_id`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<RoomId>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, room_id, query.player_id, state))
}

async fn handle_socket(
    socket: WebSocket,
    room_id: RoomId,
    player_id: Option<PlayerId>,
    state: AppState,
) {
    let (mut sender, mut receiver) = socket.split();
    let subscriber_id = Uuid::new_v4();

    let (event_tx, mut event_rx) = mpsc::channel::<RoomEvent>(EVENT_BUFFER);
    if let Err(e) = state.rooms.subscribe(room_id, subscriber_id, event_tx).await {
        tracing::warn!(room_id, "WebSocket subscribe failed: {}", e);
        let error = ServerMessage::Error {
            message: e.client_message(),
        };
        if let Some(message) = error.to_text() {
            let _ = sender.send(message).await;
        }
        let _ = sender.close().await;
        return;
    }

    metrics::websocket_connected();
    tracing::info!(room_id, ?player_id, "WebSocket connected");

    // Replies to this client's own commands.
    let (reply_tx, mut reply_rx) = mpsc::channel::<Message>(EVENT_BUFFER);

    let send_state = state.clone();
    let send_task = tokio::spawn(async move {
        let mut resend = tokio::time::interval(send_state.snapshot_resend_interval);
        // The subscription already delivers the first snapshot.
        resend.tick().await;

        loop {
            let message = tokio::select! {
                event = event_rx.recv() => match event {
                    Some(RoomEvent::Snapshot(snapshot)) => {
                        ServerMessage::Snapshot(&snapshot).to_text()
                    }
                    Some(RoomEvent::RoundResult(result)) => {
                        ServerMessage::RoundResult(&result).to_text()
                    }
                    Some(RoomEvent::Closed) | None => {
                        if let Some(message) = ServerMessage::Closed.to_text() {
                            let _ = sender.send(message).await;
                        }
                        break;
                    }
                },
                Some(reply) = reply_rx.recv() => Some(reply),
                _ = resend.tick() => match send_state.rooms.snapshot(room_id).await {
                    Ok(snapshot) => ServerMessage::Snapshot(&snapshot).to_text(),
                    Err(_) => None,
                },
            };

            if let Some(message) = message {
                if sender.send(message).await.is_err() {
                    break;
                }
                metrics::websocket_messages_sent();
            }
        }
        let _ = sender.close().await;
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        handle_client_message(client_msg, room_id, player_id, &state).await
                    }
                    Err(e) => {
                        tracing::debug!("Failed to parse client message: {}", e);
                        ServerMessage::Error {
                            message: "Invalid message format".to_string(),
                        }
                        .to_text()
                    }
                };

                if let Some(reply) = reply
                    && reply_tx.send(reply).await.is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    state.rooms.unsubscribe(room_id, subscriber_id).await;
    metrics::websocket_disconnected();
    tracing::info!(room_id, ?player_id, "WebSocket disconnected");
}

async fn handle_client_message(
    msg: ClientMessage,
    room_id: RoomId,
    player_id: Option<PlayerId>,
    state: &AppState,
) -> Option<Message> {
    match msg {
        ClientMessage::Command { token, command } => {
            let Some(player_id) = player_id else {
                return ServerMessage::Error {
                    message: "Connect with ?player_id= to send commands".to_string(),
                }
                .to_text();
            };

            let kind = command.kind().to_string();
            let reply = match state.rooms.command(room_id, player_id, token, command).await {
                Ok(response) => {
                    metrics::command_processed(&kind, response.is_success());
                    ServerMessage::from_response(response)
                }
                Err(e) => ServerMessage::Error {
                    message: e.client_message(),
                },
            };
            reply.to_text()
        }
        ClientMessage::Refresh => match state.rooms.snapshot(room_id).await {
            Ok(snapshot) => ServerMessage::Snapshot(&snapshot).to_text(),
            Err(e) => ServerMessage::Error {
                message: e.client_message(),
            }
            .to_text(),
        },
    }
}
