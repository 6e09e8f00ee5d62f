//! Application State
//!
//! [`AppState`] is the central container handed to every axum handler and
//! every connection task. All live maps it owns (rooms, presences, per-board
//! counters, cursor buffers, compaction flags) are process-global and each
//! has exactly one owner module; nothing here coordinates across processes.
//!
//! `FromRef` implementations let handlers extract just the part of the
//! state they need, following axum's recommended pattern.

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::backend::auth::TokenVerifier;
use crate::backend::presence::{CursorBatcher, RoomRegistry};
use crate::backend::sequencer::Sequencer;
use crate::backend::server::config::ServerConfig;
use crate::backend::snapshot::Compactor;

/// Shared state of the whole server process.
#[derive(Clone)]
pub struct AppState {
    /// Process-global database connection pool.
    pub db: PgPool,
    /// Resolved environment configuration.
    pub config: Arc<ServerConfig>,
    /// Bearer-token verification (no-op when no secret is configured).
    pub verifier: TokenVerifier,
    /// Per-board event ordering authority.
    pub sequencer: Arc<Sequencer>,
    /// Room membership and presence records.
    pub rooms: Arc<RoomRegistry>,
    /// Coalescing buffer drained by the cursor batch tick.
    pub cursors: Arc<CursorBatcher>,
    /// Background snapshot compaction.
    pub compactor: Arc<Compactor>,
}

impl AppState {
    pub fn new(config: ServerConfig, db: PgPool) -> Self {
        let verifier = TokenVerifier::new(config.auth_secret_key.clone());
        let sequencer = Arc::new(Sequencer::new(db.clone()));
        let compactor = Arc::new(Compactor::new(db.clone(), config.compaction_threshold));

        Self {
            db,
            config: Arc::new(config),
            verifier,
            sequencer,
            rooms: Arc::new(RoomRegistry::new()),
            cursors: Arc::new(CursorBatcher::new()),
            compactor,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for TokenVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl FromRef<AppState> for Arc<RoomRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.rooms.clone()
    }
}

impl FromRef<AppState> for Arc<Sequencer> {
    fn from_ref(state: &AppState) -> Self {
        state.sequencer.clone()
    }
}
