//! Integration tests for the HTTP API.
//!
//! The router runs against in-memory rooms, so no database is needed.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method
use tp_server::api::{AppState, create_router};
use trivia_poker::{
    RoomManager,
    ledger::ChipLedger,
    question::{Question, StaticQuestionSource},
};

fn bank() -> Vec<Question> {
    vec![
        Question {
            id: 1,
            prompt: "Height of Mount Everest in metres?".to_string(),
            hints: ["Over 8000".to_string(), "Under 9000".to_string()],
            correct_answer: 8849.0,
            difficulty: 3,
        },
        Question {
            id: 2,
            prompt: "Keys on a standard piano?".to_string(),
            hints: ["Fewer than 100".to_string(), "More than 80".to_string()],
            correct_answer: 88.0,
            difficulty: 2,
        },
    ]
}

fn create_test_server_with(questions: Vec<Question>) -> Router {
    let questions = Arc::new(StaticQuestionSource::new(questions).unwrap());
    let rooms = RoomManager::new(questions, ChipLedger::new());
    create_router(AppState::new(rooms))
}

fn create_test_server() -> Router {
    create_test_server_with(bank())
}

async fn request(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Room 1 with players 1, 2, 3 seated.
async fn seated_room(app: &Router) -> i64 {
    let (status, body) = request(
        app,
        "POST",
        "/api/v1/rooms",
        Some(json!({ "name": "Pub quiz" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let room_id = body["room_id"].as_i64().unwrap();

    for (player_id, name) in [(1, "ada"), (2, "grace"), (3, "edsger")] {
        let (status, _) = request(
            app,
            "POST",
            &format!("/api/v1/rooms/{room_id}/join"),
            Some(json!({ "player_id": player_id, "name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    room_id
}

async fn command(app: &Router, room_id: i64, player_id: i64, token: &str, command: Value) -> (StatusCode, Value) {
    request(
        app,
        "POST",
        &format!("/api/v1/rooms/{room_id}/commands"),
        Some(json!({ "player_id": player_id, "token": token, "command": command })),
    )
    .await
}

// ============================================================================
// Health and listing
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let app = create_test_server();

    let (status, body) = request(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rooms"], 0);
    assert!(body["database"].is_null());
}

#[tokio::test]
async fn test_create_and_list_rooms() {
    let app = create_test_server();
    let room_id = seated_room(&app).await;

    let (status, body) = request(&app, "GET", "/api/v1/rooms", None).await;
    assert_eq!(status, StatusCode::OK);

    let rooms = body.as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["room_id"], room_id);
    assert_eq!(rooms[0]["name"], "Pub quiz");
    assert_eq!(rooms[0]["player_count"], 3);
    assert_eq!(rooms[0]["lifecycle"], "waiting");
}

#[tokio::test]
async fn test_create_room_with_bad_settings() {
    let app = create_test_server();

    let (status, body) = request(
        &app,
        "POST",
        "/api/v1/rooms",
        Some(json!({ "name": "Broken", "small_blind": 20, "big_blind": 10 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Big blind"));
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_round_flow_over_http() {
    let app = create_test_server();
    let room_id = seated_room(&app).await;

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/v1/rooms/{room_id}/start"),
        Some(json!({ "player_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    for player_id in 1..=3 {
        let (status, _) = command(
            &app,
            room_id,
            player_id,
            &format!("estimate-{player_id}"),
            json!({ "type": "submit_estimate", "value": 100.0 * player_id as f64 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, snapshot) =
        request(&app, "GET", &format!("/api/v1/rooms/{room_id}/snapshot"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["stage"], "betting1");
    assert_eq!(snapshot["turn"], 2);
    assert_eq!(snapshot["pot"], 15);
    // Estimates stay hidden until results.
    assert!(snapshot["players"][0]["estimate"].is_null());
    assert_eq!(snapshot["players"][0]["has_estimate"], true);

    // Seat 2 is up, so player 1 calling is out of turn.
    let (status, body) = command(&app, room_id, 1, "early-call", json!({ "type": "call" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("not your turn"));

    let (status, _) = command(&app, room_id, 3, "call-3", json!({ "type": "call" })).await;
    assert_eq!(status, StatusCode::OK);

    let (_, snapshot) =
        request(&app, "GET", &format!("/api/v1/rooms/{room_id}/snapshot"), None).await;
    assert_eq!(snapshot["pot"], 25);
    assert_eq!(snapshot["turn"], 0);
}

#[tokio::test]
async fn test_duplicate_token_reports_duplicate() {
    let app = create_test_server();
    let room_id = seated_room(&app).await;
    request(
        &app,
        "POST",
        &format!("/api/v1/rooms/{room_id}/start"),
        Some(json!({ "player_id": 1 })),
    )
    .await;

    let estimate = json!({ "type": "submit_estimate", "value": 42.0 });
    let (status, first) = command(&app, room_id, 2, "same-token", estimate.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "accepted");

    let (status, second) = command(&app, room_id, 2, "same-token", estimate).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "duplicate");
    assert_eq!(second["version"], first["version"]);
}

#[tokio::test]
async fn test_unknown_room_is_not_found() {
    let app = create_test_server();

    let (status, body) = command(&app, 99, 1, "t", json!({ "type": "fold" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Room not found");

    let (status, _) = request(&app, "GET", "/api/v1/rooms/99/snapshot", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_without_questions_is_unavailable() {
    let app = create_test_server_with(vec![]);
    let room_id = seated_room(&app).await;

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/v1/rooms/{room_id}/start"),
        Some(json!({ "player_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // The room stays where it was.
    let (_, snapshot) =
        request(&app, "GET", &format!("/api/v1/rooms/{room_id}/snapshot"), None).await;
    assert_eq!(snapshot["lifecycle"], "waiting");
    assert!(snapshot["stage"].is_null());
}

// ============================================================================
// Polling and closing
// ============================================================================

#[tokio::test]
async fn test_snapshot_since_current_version_is_not_modified() {
    let app = create_test_server();
    let room_id = seated_room(&app).await;

    let uri = format!("/api/v1/rooms/{room_id}/snapshot");
    let (_, snapshot) = request(&app, "GET", &uri, None).await;
    let version = snapshot["version"].as_u64().unwrap();

    let (status, body) = request(&app, "GET", &format!("{uri}?since={version}"), None).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert!(body.is_null());

    let (status, _) = request(&app, "GET", &format!("{uri}?since={}", version - 1), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_close_room_requires_host() {
    let app = create_test_server();
    let room_id = seated_room(&app).await;
    let uri = format!("/api/v1/rooms/{room_id}/close");

    let (status, _) = request(&app, "POST", &uri, Some(json!({ "player_id": 2 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = request(&app, "POST", &uri, Some(json!({ "player_id": 1 }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(&app, "POST", &uri, Some(json!({ "player_id": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, rooms) = request(&app, "GET", "/api/v1/rooms", None).await;
    assert!(rooms.as_array().unwrap().is_empty());
}
