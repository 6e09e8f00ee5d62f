//! Room fan-out
//!
//! Broadcasts one serialized frame to every connection in a room by pushing
//! it onto each connection's outbound queue. Sends are best-effort: a
//! closed queue means that connection's writer already died and its own
//! leave path is running or about to; the broadcast continues to the rest.
//!
//! Ordering note: callers that need per-recipient `seq` ordering (draw
//! fan-out) invoke this from inside the sequencer's per-board critical
//! section. The pushes here are synchronous and never await, so holding
//! that lock across the fan-out is safe and cheap.

use crate::backend::presence::{ConnId, RoomRegistry};
use crate::shared::protocol::ServerMessage;

/// Send `message` to every connection in `board_id`'s room, optionally
/// skipping one connection (used for `USER_JOIN`, which the joiner receives
/// as `USER_LIST` instead). Returns the number of queues reached.
pub fn broadcast(
    registry: &RoomRegistry,
    board_id: &str,
    message: &ServerMessage,
    skip: Option<ConnId>,
) -> usize {
    let frame = message.to_frame();
    let mut reached = 0;

    for (conn_id, sender) in registry.connections(board_id) {
        if Some(conn_id) == skip {
            continue;
        }
        match sender.send(frame.clone()) {
            Ok(()) => reached += 1,
            Err(_) => {
                // Writer gone; that connection's cleanup broadcasts its own
                // USER_LEAVE. Nothing to do here.
                tracing::debug!(board_id, %conn_id, "[Fanout] dropping frame for dead connection");
            }
        }
    }

    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::auth::resolve_identity;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[test]
    fn broadcast_reaches_all_connections_including_sender() {
        let registry = RoomRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.join(a, "b1", &resolve_identity(None, Some("u1".into()), None, true), tx1);
        registry.join(b, "b1", &resolve_identity(None, Some("u2".into()), None, true), tx2);

        let reached = broadcast(&registry, "b1", &ServerMessage::Pong, None);
        assert_eq!(reached, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn skip_excludes_exactly_one_connection() {
        let registry = RoomRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.join(a, "b1", &resolve_identity(None, Some("u1".into()), None, true), tx1);
        registry.join(b, "b1", &resolve_identity(None, Some("u2".into()), None, true), tx2);

        let reached = broadcast(&registry, "b1", &ServerMessage::Pong, Some(a));
        assert_eq!(reached, 1);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn dead_queue_does_not_abort_the_broadcast() {
        let registry = RoomRegistry::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.join(a, "b1", &resolve_identity(None, Some("u1".into()), None, true), tx1);
        registry.join(b, "b1", &resolve_identity(None, Some("u2".into()), None, true), tx2);

        drop(rx1); // first connection's writer is gone

        let reached = broadcast(&registry, "b1", &ServerMessage::Pong, None);
        assert_eq!(reached, 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn broadcast_to_unknown_board_reaches_nobody() {
        let registry = RoomRegistry::new();
        assert_eq!(broadcast(&registry, "nowhere", &ServerMessage::Pong, None), 0);
    }
}
