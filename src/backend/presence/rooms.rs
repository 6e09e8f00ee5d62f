//! Room membership and presence records
//!
//! The registry owns all in-memory room state: which connections are in
//! which board, and one [`Presence`] per `(board, user)`. Rooms are created
//! lazily on the first join and torn down when the last connection leaves.
//!
//! Everything sits behind one `std::sync::Mutex` that is only ever held for
//! map operations, never across an await, so membership and cursor
//! broadcasts cannot serialize against event sequencing.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::auth::UserIdentity;
use crate::shared::protocol::{CursorState, Presence};

/// Identifies one WebSocket connection for the lifetime of the process.
pub type ConnId = Uuid;

/// Outbound frame queue of a connection. Frames pushed here are written to
/// the socket in order by that connection's writer task.
pub type FrameSender = mpsc::UnboundedSender<String>;

/// A presence record together with the connection that owns it. When the
/// same user rejoins on a new connection the slot is replaced; the old
/// connection's leave must then not tear the new record down.
struct PresenceSlot {
    owner: ConnId,
    presence: Presence,
}

#[derive(Default)]
struct Room {
    connections: HashMap<ConnId, FrameSender>,
    presences: HashMap<String, PresenceSlot>,
}

#[derive(Default)]
struct RegistryInner {
    rooms: HashMap<String, Room>,
    /// Reverse index: connection → board it joined.
    conn_boards: HashMap<ConnId, String>,
    /// Connection → user id, for leave and cursor attribution.
    conn_users: HashMap<ConnId, String>,
}

/// What a `leave` observed, for the caller to broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveOutcome {
    pub board_id: String,
    pub user_id: String,
    /// False when a rejoin already replaced this connection's presence, in
    /// which case no `USER_LEAVE` must be sent.
    pub presence_removed: bool,
}

/// Attribution for a cursor move, fed to the batcher.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorUpdate {
    pub board_id: String,
    pub user_id: String,
    pub display_name: String,
    pub avatar_color: String,
}

/// Process-global owner of rooms and presences.
#[derive(Default)]
pub struct RoomRegistry {
    inner: Mutex<RegistryInner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a connection in a board's room and install its presence,
    /// replacing any previous record for the same user. Returns the
    /// presence as it should appear in `USER_JOIN`.
    pub fn join(
        &self,
        conn_id: ConnId,
        board_id: &str,
        identity: &UserIdentity,
        sender: FrameSender,
    ) -> Presence {
        let presence = Presence {
            user_id: identity.user_id.clone(),
            display_name: identity.display_name.clone(),
            is_anonymous: identity.is_anonymous,
            avatar_color: identity.avatar_color.clone(),
            cursor: None,
            connected_at: Utc::now().timestamp_millis(),
        };

        let mut inner = self.inner.lock().expect("room registry poisoned");
        let room = inner.rooms.entry(board_id.to_string()).or_default();
        room.connections.insert(conn_id, sender);
        room.presences.insert(
            identity.user_id.clone(),
            PresenceSlot {
                owner: conn_id,
                presence: presence.clone(),
            },
        );
        inner
            .conn_boards
            .insert(conn_id, board_id.to_string());
        inner.conn_users.insert(conn_id, identity.user_id.clone());

        presence
    }

    /// Remove a connection from its room. Idempotent: a second call for the
    /// same connection returns `None`. The room itself is dropped when its
    /// last connection goes.
    pub fn leave(&self, conn_id: ConnId) -> Option<LeaveOutcome> {
        let mut inner = self.inner.lock().expect("room registry poisoned");
        let board_id = inner.conn_boards.remove(&conn_id)?;
        let user_id = inner.conn_users.remove(&conn_id)?;

        let mut presence_removed = false;
        let mut room_empty = false;
        if let Some(room) = inner.rooms.get_mut(&board_id) {
            room.connections.remove(&conn_id);
            if room
                .presences
                .get(&user_id)
                .is_some_and(|slot| slot.owner == conn_id)
            {
                room.presences.remove(&user_id);
                presence_removed = true;
            }
            room_empty = room.connections.is_empty();
        }
        if room_empty {
            inner.rooms.remove(&board_id);
            tracing::debug!(%board_id, "[Rooms] room removed (empty)");
        }

        Some(LeaveOutcome {
            board_id,
            user_id,
            presence_removed,
        })
    }

    /// Record a cursor position on the connection's presence and return the
    /// attribution needed to queue it for batching. `None` when the
    /// connection is not joined anywhere.
    pub fn update_cursor(&self, conn_id: ConnId, x: f64, y: f64) -> Option<CursorUpdate> {
        let mut inner = self.inner.lock().expect("room registry poisoned");
        let board_id = inner.conn_boards.get(&conn_id)?.clone();
        let user_id = inner.conn_users.get(&conn_id)?.clone();

        let room = inner.rooms.get_mut(&board_id)?;
        let slot = room.presences.get_mut(&user_id)?;
        slot.presence.cursor = Some(CursorState {
            x,
            y,
            t: Utc::now().timestamp_millis(),
        });

        Some(CursorUpdate {
            board_id,
            user_id,
            display_name: slot.presence.display_name.clone(),
            avatar_color: slot.presence.avatar_color.clone(),
        })
    }

    /// Snapshot of the outbound queues of every connection in a room.
    pub fn connections(&self, board_id: &str) -> Vec<(ConnId, FrameSender)> {
        let inner = self.inner.lock().expect("room registry poisoned");
        inner
            .rooms
            .get(board_id)
            .map(|room| {
                room.connections
                    .iter()
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current presences of a room.
    pub fn presences(&self, board_id: &str) -> Vec<Presence> {
        let inner = self.inner.lock().expect("room registry poisoned");
        inner
            .rooms
            .get(board_id)
            .map(|room| {
                room.presences
                    .values()
                    .map(|slot| slot.presence.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Which board a connection is joined to, if any.
    pub fn board_of(&self, conn_id: ConnId) -> Option<String> {
        let inner = self.inner.lock().expect("room registry poisoned");
        inner.conn_boards.get(&conn_id).cloned()
    }

    /// Number of live rooms, for logs and tests.
    pub fn room_count(&self) -> usize {
        self.inner.lock().expect("room registry poisoned").rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::auth::resolve_identity;

    fn identity(user: &str) -> UserIdentity {
        resolve_identity(None, Some(user.to_string()), None, true)
    }

    fn sender() -> (FrameSender, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn join_then_leave_restores_pre_join_state() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = sender();

        registry.join(conn, "b1", &identity("u1"), tx);
        assert_eq!(registry.presences("b1").len(), 1);
        assert_eq!(registry.room_count(), 1);

        let outcome = registry.leave(conn).unwrap();
        assert_eq!(outcome.board_id, "b1");
        assert_eq!(outcome.user_id, "u1");
        assert!(outcome.presence_removed);
        assert!(registry.presences("b1").is_empty());
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn leave_is_idempotent() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = sender();
        registry.join(conn, "b1", &identity("u1"), tx);

        assert!(registry.leave(conn).is_some());
        assert!(registry.leave(conn).is_none());
    }

    #[test]
    fn rejoin_replaces_presence_and_shields_it_from_old_leave() {
        let registry = RoomRegistry::new();
        let old_conn = Uuid::new_v4();
        let new_conn = Uuid::new_v4();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        registry.join(old_conn, "b1", &identity("u1"), tx1);
        registry.join(new_conn, "b1", &identity("u1"), tx2);

        // Both connections are in the room, one presence record.
        assert_eq!(registry.connections("b1").len(), 2);
        assert_eq!(registry.presences("b1").len(), 1);

        // The replaced connection's leave must not announce a USER_LEAVE.
        let outcome = registry.leave(old_conn).unwrap();
        assert!(!outcome.presence_removed);
        assert_eq!(registry.presences("b1").len(), 1);

        let outcome = registry.leave(new_conn).unwrap();
        assert!(outcome.presence_removed);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn cursor_update_is_attributed_and_stored() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = sender();
        registry.join(conn, "b1", &identity("u1"), tx);

        let update = registry.update_cursor(conn, 10.0, 20.0).unwrap();
        assert_eq!(update.board_id, "b1");
        assert_eq!(update.user_id, "u1");

        let presences = registry.presences("b1");
        let cursor = presences[0].cursor.unwrap();
        assert_eq!((cursor.x, cursor.y), (10.0, 20.0));
    }

    #[test]
    fn cursor_update_without_join_is_none() {
        let registry = RoomRegistry::new();
        assert!(registry.update_cursor(Uuid::new_v4(), 1.0, 2.0).is_none());
    }

    #[test]
    fn rooms_are_isolated() {
        let registry = RoomRegistry::new();
        let conn1 = Uuid::new_v4();
        let conn2 = Uuid::new_v4();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();

        registry.join(conn1, "b1", &identity("u1"), tx1);
        registry.join(conn2, "b2", &identity("u2"), tx2);

        assert_eq!(registry.connections("b1").len(), 1);
        assert_eq!(registry.connections("b2").len(), 1);
        assert_eq!(registry.board_of(conn1).as_deref(), Some("b1"));
        assert_eq!(registry.board_of(conn2).as_deref(), Some("b2"));
    }
}
