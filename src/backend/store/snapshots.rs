//! Snapshot persistence
//!
//! At most one snapshot per board: a base64 PNG rendered from the log prefix
//! up to `seq`, plus the world-space origin the image must be blitted at.
//! Snapshots are advisory: absent or stale rows never change replay
//! semantics, so the writer is a plain idempotent upsert.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::StoreError;

/// One stored snapshot row.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredSnapshot {
    pub board_id: String,
    pub seq: i64,
    /// Base64-encoded PNG.
    pub image_data: String,
    pub offset_x: f64,
    pub offset_y: f64,
    pub created_at: DateTime<Utc>,
}

/// Fetch the snapshot for a board, if one exists.
pub async fn get_snapshot(
    pool: &PgPool,
    board_id: &str,
) -> Result<Option<StoredSnapshot>, StoreError> {
    let snapshot = sqlx::query_as::<_, StoredSnapshot>(
        r#"
        SELECT board_id, seq, image_data, offset_x, offset_y, created_at
        FROM board_snapshots
        WHERE board_id = $1
        "#,
    )
    .bind(board_id)
    .fetch_optional(pool)
    .await?;

    Ok(snapshot)
}

/// Insert or replace the board's snapshot.
pub async fn save_snapshot(
    pool: &PgPool,
    board_id: &str,
    seq: i64,
    image_data: &str,
    offset_x: f64,
    offset_y: f64,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO board_snapshots (board_id, seq, image_data, offset_x, offset_y, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (board_id) DO UPDATE
        SET seq = EXCLUDED.seq,
            image_data = EXCLUDED.image_data,
            offset_x = EXCLUDED.offset_x,
            offset_y = EXCLUDED.offset_y,
            created_at = EXCLUDED.created_at
        "#,
    )
    .bind(board_id)
    .bind(seq)
    .bind(image_data)
    .bind(offset_x)
    .bind(offset_y)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Drop the board's snapshot, if any.
pub async fn delete_snapshot(pool: &PgPool, board_id: &str) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM board_snapshots WHERE board_id = $1")
        .bind(board_id)
        .execute(pool)
        .await?;

    Ok(())
}
