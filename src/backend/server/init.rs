//! Server Initialization
//!
//! Wires the process together: database pool and migrations, shared state,
//! the router, and the background tasks. The only periodic task is the
//! cursor batch tick, which drains the coalescing buffer and broadcasts at
//! most one `CURSOR_BATCH` per board per tick.

use std::time::Duration;

use axum::Router;

use crate::backend::realtime::fanout;
use crate::backend::routes::create_router;
use crate::backend::server::config::{connect_database, ServerConfig};
use crate::backend::server::state::AppState;
use crate::shared::protocol::ServerMessage;

/// Create the configured application.
///
/// Fails when the database is unreachable or migrations cannot run; there
/// is no degraded mode without the event log.
pub async fn create_app(config: ServerConfig) -> Result<Router<()>, sqlx::Error> {
    tracing::info!(
        port = config.port,
        compaction_threshold = config.compaction_threshold,
        cursor_batch_ms = config.cursor_batch_ms,
        auth_enabled = config.auth_secret_key.is_some(),
        "[Init] starting inkboard backend"
    );

    let pool = connect_database(&config).await?;
    let state = AppState::new(config, pool);

    spawn_cursor_tick(state.clone());

    Ok(create_router(state))
}

/// The 50 ms (configurable) cursor batch tick. One task per process.
fn spawn_cursor_tick(state: AppState) {
    let period = Duration::from_millis(state.config.cursor_batch_ms.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            for (board_id, cursors) in state.cursors.drain() {
                fanout::broadcast(
                    &state.rooms,
                    &board_id,
                    &ServerMessage::CursorBatch {
                        board_id: board_id.clone(),
                        cursors,
                    },
                    None,
                );
            }
        }
    });
}
