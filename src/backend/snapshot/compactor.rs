//! Background compaction
//!
//! When a sequenced event lands on a multiple of the compaction threshold,
//! the full log is folded into a snapshot row so future joins replay a
//! short tail instead of the whole history. Compaction is fire-and-forget:
//! it never blocks the write path, failures only log (the previous snapshot,
//! if any, stays valid), and a per-board in-progress flag suppresses
//! concurrent duplicates.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sqlx::PgPool;
use thiserror::Error;

use super::render::{render_snapshot, RenderError};
use crate::backend::store::{events, snapshots, StoreError};

#[derive(Debug, Error)]
enum CompactionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("render task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Schedules and runs per-board snapshot compaction.
pub struct Compactor {
    pool: PgPool,
    threshold: i64,
    in_progress: Mutex<HashSet<String>>,
}

impl Compactor {
    pub fn new(pool: PgPool, threshold: i64) -> Self {
        Self {
            pool,
            threshold,
            in_progress: Mutex::new(HashSet::new()),
        }
    }

    /// Called after every sequenced event. Spawns a compaction task when
    /// `seq` hits the threshold multiple and none is already running for
    /// this board; returns immediately either way.
    pub fn maybe_schedule(self: &Arc<Self>, board_id: &str, seq: i64) {
        if self.threshold <= 0 || seq <= 0 || seq % self.threshold != 0 {
            return;
        }

        {
            let mut running = self.in_progress.lock().expect("compaction flags poisoned");
            if !running.insert(board_id.to_string()) {
                tracing::debug!(board_id, seq, "[Compaction] already in progress, skipping");
                return;
            }
        }

        let this = Arc::clone(self);
        let board_id = board_id.to_string();
        tokio::spawn(async move {
            tracing::info!(%board_id, seq, "[Compaction] starting");
            match this.compact(&board_id).await {
                Ok(snapshot_seq) => {
                    tracing::info!(%board_id, snapshot_seq, "[Compaction] snapshot stored");
                }
                Err(e) => {
                    // The previous snapshot, if any, remains valid.
                    tracing::error!(%board_id, "[Compaction] failed: {e}");
                }
            }
            this.in_progress
                .lock()
                .expect("compaction flags poisoned")
                .remove(&board_id);
        });
    }

    /// Load the full log, render it off the async runtime, and upsert the
    /// snapshot pinned at the last rendered seq. Pinning at the last event
    /// actually rendered (not the triggering seq) keeps the replay contract
    /// exact even when the log grew while loading.
    async fn compact(&self, board_id: &str) -> Result<i64, CompactionError> {
        let log = events::events(&self.pool, board_id).await?;
        let Some(last) = log.last() else {
            return Ok(0);
        };
        let snapshot_seq = last.seq;

        let rendered =
            tokio::task::spawn_blocking(move || render_snapshot(&log)).await??;

        let image_data = BASE64.encode(&rendered.png);
        snapshots::save_snapshot(
            &self.pool,
            board_id,
            snapshot_seq,
            &image_data,
            rendered.offset_x,
            rendered.offset_y,
        )
        .await?;

        Ok(snapshot_seq)
    }
}
