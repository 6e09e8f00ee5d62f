//! Shared Types
//!
//! Types that cross the wire between server and clients: the drawing event
//! model and the JSON frame protocol. Everything here is plain serde data
//! with no server-side state attached.

/// Drawing event model
pub mod event;

/// WebSocket frame protocol
pub mod protocol;

pub use event::{DrawEvent, EventBody};
pub use protocol::{ClientMessage, ErrorCode, Presence, ServerMessage};
