//! HTTP/WebSocket API for trivia poker rooms.
//!
//! Commands come in over plain HTTP and are forwarded to the room's
//! coordinator. Viewers either hold a WebSocket open to get every committed
//! snapshot pushed, or poll the snapshot endpoint with the last version they
//! saw.
//!
//! # Endpoints
//!
//! ```text
//! GET  /health                              - Health check
//! GET  /api/v1/rooms                        - List rooms
//! POST /api/v1/rooms                        - Create a room
//! POST /api/v1/rooms/{room_id}/join         - Take a seat
//! POST /api/v1/rooms/{room_id}/leave        - Give up a seat
//! POST /api/v1/rooms/{room_id}/start        - Host starts the game
//! POST /api/v1/rooms/{room_id}/close        - Host closes the room
//! POST /api/v1/rooms/{room_id}/commands     - Game command
//! GET  /api/v1/rooms/{room_id}/snapshot     - Latest snapshot (?since=<version>)
//! GET  /ws/{room_id}                        - WebSocket push (?player_id=<id>)
//! ```

pub mod rooms;
pub mod websocket;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use trivia_poker::{RoomManager, db::Database};

use crate::{logging, metrics};

/// Application state shared across all HTTP handlers and WebSocket connections.
#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomManager,
    /// Present when running against Postgres; checked by `/health`
    pub database: Option<Arc<Database>>,
    /// How often WebSocket viewers get the latest snapshot again
    pub snapshot_resend_interval: Duration,
}

impl AppState {
    pub fn new(rooms: RoomManager) -> Self {
        Self {
            rooms,
            database: None,
            snapshot_resend_interval: Duration::from_secs(5),
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route("/rooms/{room_id}/join", post(rooms::join_room))
        .route("/rooms/{room_id}/leave", post(rooms::leave_room))
        .route("/rooms/{room_id}/start", post(rooms::start_game))
        .route("/rooms/{room_id}/close", post(rooms::close_room))
        .route("/rooms/{room_id}/commands", post(rooms::submit_command))
        .route("/rooms/{room_id}/snapshot", get(rooms::get_snapshot));

    Router::new()
        .route("/health", get(health_check))
        .route("/ws/{room_id}", get(websocket::websocket_handler))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(track_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Time every request and record it in logs and metrics.
async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    logging::log_api_request(&method, &path, status, elapsed.as_millis() as u64);
    metrics::http_requests_total(&method, &path, status);
    metrics::http_request_duration_ms(&method, &path, elapsed.as_secs_f64() * 1000.0);

    response
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `503 Service Unavailable` when the database is configured but not
/// answering.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(db) => db.health_check().await.is_ok(),
        None => true,
    };
    let room_count = state.rooms.room_count().await;

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": state.database.as_ref().map(|_| db_healthy),
        "rooms": room_count,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
