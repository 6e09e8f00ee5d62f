//! Presence Manager
//!
//! Per-board rooms ([`rooms`]) and the coalesced cursor buffer
//! ([`cursors`]). Presence is ephemeral: it lives only in this process and
//! vanishes with the connection that owns it.

pub mod cursors;
pub mod rooms;

pub use cursors::CursorBatcher;
pub use rooms::{ConnId, FrameSender, LeaveOutcome, RoomRegistry};
