//! Cursor coalescing
//!
//! Cursor traffic is lossy by contract: the server promises at most one
//! `CURSOR_BATCH` per board per tick, carrying the latest position per user
//! since the previous tick. A user who moves twenty times inside one tick
//! costs each peer exactly one outbound message.
//!
//! The buffer is a plain map behind a `std::sync::Mutex`; the periodic
//! drain-and-broadcast task lives in server init.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::shared::protocol::CursorEntry;

/// Latest pending cursor state for one user on one board.
#[derive(Debug, Clone, PartialEq)]
struct PendingCursor {
    display_name: String,
    avatar_color: String,
    x: f64,
    y: f64,
}

/// Coalescing buffer: `board → user → latest position`.
#[derive(Default)]
pub struct CursorBatcher {
    boards: Mutex<HashMap<String, HashMap<String, PendingCursor>>>,
}

impl CursorBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a position, overwriting any earlier one from the same user in
    /// the current tick window.
    pub fn queue(
        &self,
        board_id: &str,
        user_id: &str,
        display_name: &str,
        avatar_color: &str,
        x: f64,
        y: f64,
    ) {
        let mut boards = self.boards.lock().expect("cursor buffer poisoned");
        boards.entry(board_id.to_string()).or_default().insert(
            user_id.to_string(),
            PendingCursor {
                display_name: display_name.to_string(),
                avatar_color: avatar_color.to_string(),
                x,
                y,
            },
        );
    }

    /// Take and clear everything queued since the last drain, grouped per
    /// board. Boards with no pending cursors produce no entry at all.
    pub fn drain(&self) -> Vec<(String, Vec<CursorEntry>)> {
        let mut boards = self.boards.lock().expect("cursor buffer poisoned");
        boards
            .drain()
            .map(|(board_id, users)| {
                let cursors = users
                    .into_iter()
                    .map(|(user_id, pending)| CursorEntry {
                        user_id,
                        display_name: pending.display_name,
                        avatar_color: Some(pending.avatar_color),
                        x: pending.x,
                        y: pending.y,
                    })
                    .collect();
                (board_id, cursors)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_moves_coalesce_to_one_entry_with_last_position() {
        let batcher = CursorBatcher::new();
        for i in 0..20 {
            batcher.queue("b1", "u1", "Ada", "#e07a5f", i as f64, (i * 2) as f64);
        }

        let drained = batcher.drain();
        assert_eq!(drained.len(), 1);
        let (board, cursors) = &drained[0];
        assert_eq!(board, "b1");
        assert_eq!(cursors.len(), 1);
        assert_eq!((cursors[0].x, cursors[0].y), (19.0, 38.0));
    }

    #[test]
    fn drain_clears_the_buffer() {
        let batcher = CursorBatcher::new();
        batcher.queue("b1", "u1", "Ada", "#e07a5f", 1.0, 1.0);
        assert_eq!(batcher.drain().len(), 1);
        assert!(batcher.drain().is_empty());
    }

    #[test]
    fn boards_drain_independently() {
        let batcher = CursorBatcher::new();
        batcher.queue("b1", "u1", "Ada", "#e07a5f", 1.0, 1.0);
        batcher.queue("b2", "u2", "Bo", "#3d8a5f", 2.0, 2.0);
        batcher.queue("b2", "u3", "Cy", "#5f6caf", 3.0, 3.0);

        let mut drained = batcher.drain();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].1.len(), 1);
        assert_eq!(drained[1].1.len(), 2);
    }
}
