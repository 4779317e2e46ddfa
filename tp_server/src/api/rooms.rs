//! Room management and command handlers.
//!
//! Every mutating endpoint answers with the snapshot version the room
//! committed, or with the rejection. Rejections never change room state.
//!
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/rooms/1/commands \
//!   -H "Content-Type: application/json" \
//!   -d '{"player_id": 3, "token": "c1f0", "command": {"type": "raise", "increment": 20}}'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use trivia_poker::{
    Command, CommandToken, GameError, RoomConfig, RoomResponse,
    entities::{PlayerId, RoomId},
    room::{RoomError, RoomSummary},
};

use super::AppState;
use crate::metrics;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub player_id: PlayerId,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayerRequest {
    pub player_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct StartGameRequest {
    pub player_id: PlayerId,
    /// Generated server-side when omitted
    pub token: Option<CommandToken>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub player_id: PlayerId,
    pub token: CommandToken,
    pub command: Command,
}

/// Body of every successful mutation.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandResponse {
    Accepted { version: u64 },
    /// The token was seen before; nothing was applied twice
    Duplicate { version: u64 },
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    /// Last version the viewer already has
    pub since: Option<u64>,
}

fn room_error(e: RoomError) -> ApiError {
    let status = match e {
        RoomError::RoomNotFound(_) | RoomError::RoomStopped(_) => StatusCode::NOT_FOUND,
        RoomError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.client_message(),
        }),
    )
}

/// Map a coordinator response onto the HTTP contract.
pub(crate) fn command_response(
    response: RoomResponse,
) -> Result<Json<CommandResponse>, ApiError> {
    match response {
        RoomResponse::Accepted { version } => Ok(Json(CommandResponse::Accepted { version })),
        RoomResponse::Duplicate { version } => Ok(Json(CommandResponse::Duplicate { version })),
        RoomResponse::Rejected(e) => {
            let status = match e {
                GameError::InvalidCommand(_) => StatusCode::CONFLICT,
                GameError::NoQuestionAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

/// List all live rooms.
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.rooms.list_rooms().await)
}

/// Create a room. Settings missing from the body take their defaults.
///
/// Returns `201 Created` with the new room id, or `400` for bad settings.
pub async fn create_room(
    State(state): State<AppState>,
    Json(config): Json<RoomConfig>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), ApiError> {
    let room_id = state.rooms.create_room(config).await.map_err(room_error)?;

    metrics::observe_room(&state.rooms, room_id).await;
    metrics::active_rooms(state.rooms.room_count().await);
    tracing::info!(room_id, "Room created");

    Ok((StatusCode::CREATED, Json(CreateRoomResponse { room_id })))
}

pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(request): Json<JoinRoomRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let response = state
        .rooms
        .join(room_id, request.player_id, request.name)
        .await
        .map_err(room_error)?;
    command_response(response)
}

pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(request): Json<PlayerRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let response = state
        .rooms
        .leave(room_id, request.player_id)
        .await
        .map_err(room_error)?;
    command_response(response)
}

/// Host starts the game. `503` when no question could be drawn.
pub async fn start_game(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(request): Json<StartGameRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let token = request.token.unwrap_or_else(CommandToken::random);
    let response = state
        .rooms
        .start_game(room_id, request.player_id, token)
        .await
        .map_err(room_error)?;
    command_response(response)
}

pub async fn close_room(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(request): Json<PlayerRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let response = state
        .rooms
        .close(room_id, request.player_id)
        .await
        .map_err(room_error)?;

    if response.is_success() {
        metrics::active_rooms(state.rooms.room_count().await);
    }
    command_response(response)
}

/// Forward a game command.
///
/// # Errors
///
/// - `404 Not Found`: room doesn't exist or has stopped
/// - `409 Conflict`: wrong turn, wrong stage, not seated, ...
/// - `503 Service Unavailable`: a new round could not draw a question
pub async fn submit_command(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let kind = request.command.kind().to_string();
    let response = state
        .rooms
        .command(room_id, request.player_id, request.token, request.command)
        .await
        .map_err(room_error)?;

    metrics::command_processed(&kind, response.is_success());
    if let Some(message) = response.error_message() {
        tracing::debug!(room_id, player_id = request.player_id, "Rejected {}: {}", kind, message);
    }
    command_response(response)
}

/// Polling fallback. Answers `304 Not Modified` when the viewer already has
/// the latest version.
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Response, ApiError> {
    let snapshot = state.rooms.snapshot(room_id).await.map_err(room_error)?;

    if query.since.is_some_and(|since| since >= snapshot.version) {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }
    Ok(Json(&*snapshot).into_response())
}
