//! Session identity resolution
//!
//! Identity is per-session and never persisted by the core. Resolution
//! precedence is fixed and behavioral: a verified token subject wins over a
//! client-supplied id, which wins over a freshly synthesized UUID. Display
//! names default to a generated "Anonymous <Animal>" and the avatar color is
//! picked deterministically from a fixed palette by hashing the user id, so
//! every peer renders the same user identically.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The resolved identity of one connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: String,
    pub display_name: String,
    pub is_anonymous: bool,
    pub avatar_color: String,
}

/// Animals for generated anonymous display names.
const ANIMALS: &[&str] = &[
    "Otter", "Lynx", "Heron", "Badger", "Raven", "Ibex", "Marten", "Osprey",
    "Fox", "Stoat", "Puffin", "Newt", "Wombat", "Gecko", "Moose", "Tapir",
    "Kestrel", "Dormouse", "Pangolin", "Narwhal", "Quokka", "Vole", "Shrike",
    "Axolotl",
];

/// Avatar palette. Indexed by the user-id hash, never randomly.
const PALETTE: &[&str] = &[
    "#e07a5f", "#3d8a5f", "#5f6caf", "#c9a227", "#a4508b", "#2a9d8f",
    "#e76f51", "#457b9d", "#8d6a9f", "#6a994e", "#bc4749", "#1d7874",
];

/// FNV-1a over the user id. A stable hash is required here: the same user
/// must map to the same animal and color across processes and restarts,
/// which rules out `DefaultHasher`.
fn stable_hash(input: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in input.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Deterministic "Anonymous <Animal>" name for a user id.
pub fn anonymous_name(user_id: &str) -> String {
    let animal = ANIMALS[(stable_hash(user_id) % ANIMALS.len() as u64) as usize];
    format!("Anonymous {animal}")
}

/// Deterministic palette color for a user id.
pub fn avatar_color(user_id: &str) -> String {
    // Rotate the hash so the color index decorrelates from the animal index.
    let hash = stable_hash(user_id).rotate_right(17);
    PALETTE[(hash % PALETTE.len() as u64) as usize].to_string()
}

/// Resolve a connection's identity from the HELLO handshake inputs.
///
/// Precedence: `verified_subject` > `client_id` > synthesized UUID. A
/// connection with a verified subject is never anonymous regardless of what
/// the client claimed.
pub fn resolve_identity(
    verified_subject: Option<String>,
    client_id: Option<String>,
    display_name: Option<String>,
    is_anonymous: bool,
) -> UserIdentity {
    let (user_id, anonymous) = match (verified_subject, client_id) {
        (Some(subject), _) => (subject, false),
        (None, Some(client)) => (client, is_anonymous),
        (None, None) => (Uuid::new_v4().to_string(), true),
    };

    let display_name = display_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| anonymous_name(&user_id));

    UserIdentity {
        avatar_color: avatar_color(&user_id),
        user_id,
        display_name,
        is_anonymous: anonymous,
    }
}
