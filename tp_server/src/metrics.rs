//! Prometheus metrics for rooms, commands and connections.
//!
//! Everything goes through the `metrics` facade, so the calls are no-ops
//! until [`init_metrics`] installs the exporter.
//!
//! ```rust,no_run
//! use tp_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//! metrics::http_requests_total("GET", "/api/v1/rooms", 200);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use trivia_poker::{RoomEvent, RoomManager, entities::RoomId};
use uuid::Uuid;

/// Install the Prometheus exporter with a scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

pub fn websocket_connected() {
    metrics::counter!("websocket_connections_total").increment(1);
    metrics::gauge!("websocket_connections_active").increment(1.0);
}

pub fn websocket_disconnected() {
    metrics::gauge!("websocket_connections_active").decrement(1.0);
}

pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Count one command outcome, labelled by command kind.
pub fn command_processed(kind: &str, accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    metrics::counter!("commands_total",
        "kind" => kind.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn active_rooms(count: usize) {
    metrics::gauge!("active_rooms").set(count as f64);
}

pub fn rounds_completed_total() {
    metrics::counter!("rounds_completed_total").increment(1);
}

pub fn pot_size_chips(size: u32) {
    metrics::histogram!("pot_size_chips").record(f64::from(size));
}

/// Subscribe a metrics observer to `room_id`. Every round result the room
/// commits is counted once, however many viewers are attached.
pub async fn observe_room(rooms: &RoomManager, room_id: RoomId) {
    let (tx, mut rx) = mpsc::channel(16);
    if let Err(e) = rooms.subscribe(room_id, Uuid::new_v4(), tx).await {
        tracing::warn!(room_id, "Metrics observer not attached: {}", e);
        return;
    }

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                RoomEvent::RoundResult(result) => {
                    rounds_completed_total();
                    pot_size_chips(result.pot);
                }
                RoomEvent::Closed => break,
                RoomEvent::Snapshot(_) => {}
            }
        }
    });
}
