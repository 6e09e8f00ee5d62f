//! Append-only event log operations
//!
//! Events are stored as one JSONB row per `(board_id, seq)`; the row payload
//! is the full wire-form event so replay and sync can return it unchanged.

use sqlx::{PgPool, Row};

use super::StoreError;
use crate::shared::event::DrawEvent;

/// Highest assigned `seq` for a board, `0` when the log is empty.
pub async fn max_seq(pool: &PgPool, board_id: &str) -> Result<i64, StoreError> {
    let row = sqlx::query(
        "SELECT COALESCE(MAX(seq), 0) AS max_seq FROM drawing_events WHERE board_id = $1",
    )
    .bind(board_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get::<i64, _>("max_seq"))
}

/// Append one event.
///
/// A `(board_id, seq)` collision is classified as [`StoreError::DuplicateSeq`]
/// so the sequencer sees its own invariant violations as hard errors.
pub async fn append_event(pool: &PgPool, event: &DrawEvent) -> Result<(), StoreError> {
    let payload = serde_json::to_value(event)?;

    let result = sqlx::query(
        r#"
        INSERT INTO drawing_events (board_id, seq, event)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(&event.board_id)
    .bind(event.seq)
    .bind(payload)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            Err(StoreError::DuplicateSeq {
                board_id: event.board_id.clone(),
                seq: event.seq,
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Full log of a board in `seq` order.
pub async fn events(pool: &PgPool, board_id: &str) -> Result<Vec<DrawEvent>, StoreError> {
    events_after(pool, board_id, 0).await
}

/// Events with `seq` strictly greater than `after`, in `seq` order.
pub async fn events_after(
    pool: &PgPool,
    board_id: &str,
    after: i64,
) -> Result<Vec<DrawEvent>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT event
        FROM drawing_events
        WHERE board_id = $1 AND seq > $2
        ORDER BY seq ASC
        "#,
    )
    .bind(board_id)
    .bind(after)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let value: serde_json::Value = row.get("event");
            Ok(serde_json::from_value(value)?)
        })
        .collect()
}
