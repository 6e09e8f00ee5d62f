//! Access Control
//!
//! Two concerns live here: verifying opaque bearer tokens against the
//! configured shared secret ([`tokens`]) and resolving the per-session
//! identity of a connection ([`identity`]). Board-level authorization is a
//! single rule applied at HELLO time: private boards admit only their owner.

pub mod identity;
pub mod tokens;

pub use identity::{resolve_identity, UserIdentity};
pub use tokens::TokenVerifier;

use crate::backend::store::Board;

/// Outcome of the private-board check at HELLO time.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardAccess {
    Granted,
    Denied { reason: String },
}

/// Enforce per-board access for a join attempt.
///
/// Public boards accept any caller including anonymous ones. Private boards
/// require a verified subject equal to the owner; every other combination is
/// denied with a reason the client can show.
pub fn check_board_access(board: &Board, verified_subject: Option<&str>) -> BoardAccess {
    if !board.is_private {
        return BoardAccess::Granted;
    }

    match (verified_subject, board.owner_id.as_deref()) {
        (Some(subject), Some(owner)) if subject == owner => BoardAccess::Granted,
        (Some(_), _) => BoardAccess::Denied {
            reason: "this board is private".to_string(),
        },
        (None, _) => BoardAccess::Denied {
            reason: "this board is private; sign in as its owner".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn board(is_private: bool, owner: Option<&str>) -> Board {
        Board {
            id: "b1".into(),
            created_at: Utc::now(),
            name: None,
            owner_id: owner.map(String::from),
            is_private,
        }
    }

    #[test]
    fn public_board_admits_everyone() {
        assert_eq!(
            check_board_access(&board(false, None), None),
            BoardAccess::Granted
        );
        assert_eq!(
            check_board_access(&board(false, Some("u1")), Some("u2")),
            BoardAccess::Granted
        );
    }

    #[test]
    fn private_board_admits_only_its_owner() {
        let b = board(true, Some("u1"));
        assert_eq!(check_board_access(&b, Some("u1")), BoardAccess::Granted);
        assert!(matches!(
            check_board_access(&b, Some("u2")),
            BoardAccess::Denied { .. }
        ));
        assert!(matches!(
            check_board_access(&b, None),
            BoardAccess::Denied { .. }
        ));
    }

    #[test]
    fn private_ownerless_board_denies_all() {
        // Cannot occur through the creation paths, but the rule must still
        // fail closed if such a row exists.
        let b = board(true, None);
        assert!(matches!(
            check_board_access(&b, Some("u1")),
            BoardAccess::Denied { .. }
        ));
    }
}
