//! Event Sequencer
//!
//! The single ordering authority for a board. Each active board carries an
//! in-memory `next_seq` counter, lazily initialized from `max_seq + 1` on
//! first use and advanced only after the event row is durably appended.
//! Calls for the same board are totally ordered; the assigned `seq` values
//! are strictly increasing with no gaps across all callers. Boards are fully
//! independent of each other.
//!
//! Locking: the registry of per-board handles sits behind a short
//! `std::sync::Mutex` (never held across an await); the counter and the
//! dependent persist sit behind a per-board `tokio::sync::Mutex` so one slow
//! board never head-of-line blocks another. The fan-out callback runs inside
//! that same critical section, which is what guarantees every room member
//! observes events in increasing `seq` order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;

use crate::backend::store::{events, StoreError};
use crate::shared::event::{DrawEvent, EventBody};

/// Bound on the append's database round trip. An elapsed timeout surfaces as
/// [`StoreError::Timeout`] with the reservation rolled back.
const APPEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-board counter state. `None` means "not yet initialized from the
/// store", both on first use and after a duplicate-seq violation, which
/// forces a re-derive from `max_seq + 1` on the next call.
struct BoardCounter {
    next_seq: tokio::sync::Mutex<Option<i64>>,
}

/// Serializes event assignment per board and persists each event before
/// committing its `seq`.
pub struct Sequencer {
    pool: PgPool,
    boards: Mutex<HashMap<String, Arc<BoardCounter>>>,
}

impl Sequencer {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            boards: Mutex::new(HashMap::new()),
        }
    }

    fn counter(&self, board_id: &str) -> Arc<BoardCounter> {
        let mut boards = self.boards.lock().expect("sequencer registry poisoned");
        boards
            .entry(board_id.to_string())
            .or_insert_with(|| {
                Arc::new(BoardCounter {
                    next_seq: tokio::sync::Mutex::new(None),
                })
            })
            .clone()
    }

    /// Warm a board's counter from the store so the first draw after a join
    /// does not pay the `max_seq` lookup.
    pub async fn ensure_initialized(&self, board_id: &str) -> Result<(), StoreError> {
        let counter = self.counter(board_id);
        let mut next = counter.next_seq.lock().await;
        if next.is_none() {
            *next = Some(events::max_seq(&self.pool, board_id).await? + 1);
        }
        Ok(())
    }

    /// Assign the next `seq` for `board_id`, persist the event, and return it.
    ///
    /// `on_committed` runs with the board's lock still held, immediately after
    /// the durable append and counter advance. Callers use it to enqueue the
    /// fan-out so recipients see `seq` order; it must stay synchronous and
    /// cheap (channel pushes, no awaits).
    ///
    /// On persistence failure the reserved `seq` is not committed: the next
    /// call reuses it. A duplicate-key violation additionally resets the
    /// counter so it re-derives from the log, which is the repair path for a
    /// corrupted in-memory counter.
    pub async fn sequence<F>(
        &self,
        board_id: &str,
        user_id: &str,
        body: EventBody,
        on_committed: F,
    ) -> Result<DrawEvent, StoreError>
    where
        F: FnOnce(&DrawEvent),
    {
        let counter = self.counter(board_id);
        let mut next = counter.next_seq.lock().await;

        let seq = match *next {
            Some(seq) => seq,
            None => {
                let seq = events::max_seq(&self.pool, board_id).await? + 1;
                *next = Some(seq);
                seq
            }
        };

        let event = DrawEvent {
            board_id: board_id.to_string(),
            seq,
            user_id: user_id.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            body,
        };

        let append = tokio::time::timeout(APPEND_TIMEOUT, events::append_event(&self.pool, &event));
        match append.await {
            Ok(Ok(())) => {
                *next = Some(seq + 1);
                on_committed(&event);
                Ok(event)
            }
            Ok(Err(e @ StoreError::DuplicateSeq { .. })) => {
                // The log disagrees with the in-memory counter. Drop the
                // counter so the next call re-derives it from max_seq.
                tracing::error!(
                    board_id,
                    seq,
                    "[Sequencer] append collided with an existing row: {e}"
                );
                *next = None;
                Err(e)
            }
            Ok(Err(e)) => {
                tracing::warn!(board_id, seq, "[Sequencer] append failed, seq rolled back: {e}");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(board_id, seq, "[Sequencer] append timed out, seq rolled back");
                Err(StoreError::Timeout)
            }
        }
    }
}
