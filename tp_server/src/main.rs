//! Trivia poker room server.
//!
//! Runs against Postgres when a database URL is configured, otherwise keeps
//! everything in memory and draws questions from a JSON bank.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Error, anyhow};
use ctrlc::set_handler;
use pico_args::Arguments;
use tokio::sync::watch;
use tp_server::{api, config::ServerConfig, logging, metrics};
use trivia_poker::{
    RoomConfig, RoomManager,
    db::{Database, MemoryRoomStore, PgRoomStore, StoreWriter},
    ledger::ChipLedger,
    question::{PgQuestionSource, StaticQuestionSource},
};

const HELP: &str = "\
Run a trivia poker room server

USAGE:
  tp_server [OPTIONS]

OPTIONS:
  --bind          IP:PORT  Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --database-url  URL      PostgreSQL connection string [default: env DATABASE_URL]
  --questions     PATH     JSON question bank for in-memory mode [default: env QUESTIONS_FILE]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  METRICS_BIND             Prometheus scrape address (e.g., 0.0.0.0:9090)
  INITIAL_ROOMS            Rooms created on startup [default: 1]
  ROOM_*                   Settings for those rooms (ROOM_CAPACITY, ROOM_BIG_BLIND, ...)
  WS_SNAPSHOT_RESEND_SECS  Snapshot resend interval for WebSocket viewers [default: 5]
  RUST_LOG                 Log filter [default: info,sqlx=warn,hyper=warn]
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--database-url")?;
    let questions: Option<PathBuf> = pargs.opt_value_from_str("--questions")?;

    logging::init();

    let config = ServerConfig::from_env(bind, database_url, questions)?;
    config.validate()?;

    // Ctrl+C and SIGTERM both trigger a graceful shutdown.
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    set_handler(move || {
        let _ = shutdown_tx.send(true);
    })?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow!(e))?;
        tracing::info!("Prometheus metrics at http://{}/metrics", addr);
    }

    let ledger = ChipLedger::new();
    let (rooms, database) = match &config.database {
        Some(db_config) => {
            let db = Database::new(db_config)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to apply migrations")?;
            tracing::info!("Database connected successfully");

            let pool = Arc::new(db.pool().clone());
            let questions = Arc::new(PgQuestionSource::new(Arc::clone(&pool)));
            let room_store = PgRoomStore::new(pool);
            let first_room_id = room_store
                .next_room_id()
                .await
                .context("Failed to read persisted rooms")?;
            let store = StoreWriter::spawn(Arc::new(room_store));
            (
                RoomManager::new(questions, ledger)
                    .with_store(store)
                    .starting_at(first_room_id),
                Some(Arc::new(db)),
            )
        }
        None => {
            let path = config
                .questions_path
                .as_ref()
                .ok_or_else(|| anyhow!("No question bank configured"))?;
            let questions = StaticQuestionSource::from_file(path)
                .with_context(|| format!("Failed to load questions from {}", path.display()))?;
            tracing::info!(
                "Running in memory with {} questions from {}",
                questions.len(),
                path.display()
            );

            let store = StoreWriter::spawn(Arc::new(MemoryRoomStore::new()));
            (
                RoomManager::new(Arc::new(questions), ledger).with_store(store),
                None,
            )
        }
    };

    for i in 0..config.initial_rooms {
        let room = RoomConfig {
            name: format!("Table {}", i + 1),
            settings: config.room_defaults.clone(),
        };
        match rooms.create_room(room).await {
            Ok(room_id) => {
                metrics::observe_room(&rooms, room_id).await;
                tracing::info!("Created room {} with ID {}", i + 1, room_id);
            }
            Err(e) => tracing::error!("Failed to create room {}: {}", i + 1, e),
        }
    }
    metrics::active_rooms(rooms.room_count().await);

    let state = api::AppState {
        rooms,
        database,
        snapshot_resend_interval: config.snapshot_resend_interval,
    };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
        .context("Server error")?;

    tracing::info!("Shutting down server...");

    Ok(())
}
