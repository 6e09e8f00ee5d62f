//! Backend Module
//!
//! Server-side code for the inkboard whiteboard backend: an axum HTTP +
//! WebSocket server that sequences drawing events per board into a
//! PostgreSQL append-only log, fans them out to room members, batches
//! cursor traffic, and compacts long logs into raster snapshots.
//!
//! # Architecture
//!
//! ```text
//! backend/
//! ├── server/     - configuration, shared state, initialization
//! ├── routes/     - router assembly and the /api board endpoints
//! ├── realtime/   - WebSocket sessions, message routing, room fan-out
//! ├── store/      - boards, event log, snapshots (sqlx/Postgres)
//! ├── sequencer/  - per-board gapless seq assignment
//! ├── presence/   - rooms, presence records, cursor coalescing
//! ├── snapshot/   - log-to-raster rendering and background compaction
//! ├── auth/       - token verification, identity, board access
//! ├── limiter/    - per-connection draw/cursor token buckets
//! ├── middleware/ - REST auth extractor
//! └── error/      - backend error types and HTTP conversion
//! ```
//!
//! # Control flow
//!
//! A connection upgrades at `/` and sends `HELLO`; access control verifies
//! the token, the presence manager places the connection in its board room,
//! and the session delivers `WELCOME`, `SYNC_SNAPSHOT`, `USER_LIST`, then
//! broadcasts `USER_JOIN`. Draw messages flow rate limiter → sequencer →
//! store → room fan-out; cursor messages flow rate limiter → presence →
//! timed batch broadcast.

pub mod auth;
pub mod error;
pub mod limiter;
pub mod middleware;
pub mod presence;
pub mod realtime;
pub mod routes;
pub mod sequencer;
pub mod server;
pub mod snapshot;
pub mod store;

pub use error::BackendError;
pub use server::{create_app, AppState, ServerConfig};
