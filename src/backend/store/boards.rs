//! Board catalog operations
//!
//! Boards are created either implicitly by the first `HELLO` that names an
//! unknown id (public, ownerless) or explicitly through the REST/WS create
//! paths. Apart from its name a board is never mutated after creation;
//! deletion is owner-only and cascades to the event log and snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::StoreError;

/// A drawing surface: the unit of ordering, fan-out, and access control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub name: Option<String>,
    pub owner_id: Option<String>,
    pub is_private: bool,
}

/// Fetch a board by id.
pub async fn get_board(pool: &PgPool, id: &str) -> Result<Option<Board>, StoreError> {
    let board = sqlx::query_as::<_, Board>(
        r#"
        SELECT id, created_at, name, owner_id, is_private
        FROM boards
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(board)
}

/// Create a board. The caller supplies the id so that implicit creation from
/// a `HELLO` can reuse the client-addressed id verbatim.
pub async fn create_board(
    pool: &PgPool,
    id: &str,
    name: Option<&str>,
    owner_id: Option<&str>,
    is_private: bool,
) -> Result<Board, StoreError> {
    let board = sqlx::query_as::<_, Board>(
        r#"
        INSERT INTO boards (id, created_at, name, owner_id, is_private)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, created_at, name, owner_id, is_private
        "#,
    )
    .bind(id)
    .bind(Utc::now())
    .bind(name)
    .bind(owner_id)
    .bind(is_private)
    .fetch_one(pool)
    .await?;

    Ok(board)
}

/// Delete a board and everything hanging off it, but only when `owner_id`
/// matches. Returns `false` without touching any row otherwise.
///
/// Event rows reference the board, so they go first inside one transaction;
/// the final `DELETE` keeps the ownership predicate so a race with an owner
/// change cannot widen the authorization.
pub async fn delete_board(pool: &PgPool, id: &str, owner_id: &str) -> Result<bool, StoreError> {
    let mut tx = pool.begin().await?;

    let owned: Option<(String,)> =
        sqlx::query_as("SELECT id FROM boards WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;
    if owned.is_none() {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("DELETE FROM board_snapshots WHERE board_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM drawing_events WHERE board_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM boards WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(deleted.rows_affected() > 0)
}

/// List boards owned by a user, newest first.
pub async fn user_boards(pool: &PgPool, owner_id: &str) -> Result<Vec<Board>, StoreError> {
    let boards = sqlx::query_as::<_, Board>(
        r#"
        SELECT id, created_at, name, owner_id, is_private
        FROM boards
        WHERE owner_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(boards)
}
