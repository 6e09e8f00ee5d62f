//! Inkboard: realtime collaborative whiteboard backend
//!
//! Many concurrent clients share named boards; each board is an append-only,
//! totally-ordered log of drawing events with this server as the sole
//! ordering authority and sole durable writer. Every participant converges
//! on the same canvas because `seq`, assigned by the per-board sequencer,
//! is the one canonical order, and snapshots are provably equivalent
//! prefixes of the log.
//!
//! # Module Structure
//!
//! - **`shared`**: wire-facing types, the drawing event model and the JSON
//!   frame protocol.
//! - **`backend`**: the axum server itself, with sessions, sequencing, persistence,
//!   presence, snapshot compaction, REST board management.
//!
//! # Guarantees
//!
//! - Per-board `seq` values are gapless and strictly increasing; the
//!   `(board_id, seq)` primary key turns any violation into a hard error.
//! - Every room member observes draw events in increasing `seq` order.
//! - Cursor delivery is lossy and batched: at most one `CURSOR_BATCH` per
//!   board per tick, last position per user wins.
//! - Snapshots are advisory; blitting one at its offset and replaying the
//!   tail is pixel-equivalent to a full replay under the same renderer.

pub mod backend;
pub mod shared;
