//! Event Store
//!
//! Durable persistence for the whiteboard: a board catalog, an append-only
//! per-board event log keyed by `(board_id, seq)`, and at most one raster
//! snapshot row per board. All operations are plain async functions over a
//! process-global [`sqlx::PgPool`].
//!
//! The log's composite primary key is load-bearing: a sequencer bug that
//! reuses a `seq` surfaces as [`StoreError::DuplicateSeq`] instead of
//! silently corrupting the board. Strict serialization of appends to one
//! board happens above this layer, in the sequencer; the store itself only
//! guarantees that a collision fails loudly.

use thiserror::Error;

pub mod boards;
pub mod events;
pub mod snapshots;

pub use boards::Board;
pub use snapshots::StoredSnapshot;

/// Errors produced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Any database failure other than the classified cases below.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// `(board_id, seq)` primary-key collision on append. Always a
    /// sequencer invariant violation, never a retriable condition.
    #[error("duplicate event seq {seq} for board {board_id}")]
    DuplicateSeq { board_id: String, seq: i64 },

    /// A persisted event row failed to decode back into a `DrawEvent`.
    #[error("corrupt event row: {0}")]
    Decode(#[from] serde_json::Error),

    /// A bounded-timeout database call did not complete in time.
    #[error("database operation timed out")]
    Timeout,
}

impl StoreError {
    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Timeout)
    }
}
