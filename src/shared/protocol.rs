//! Wire protocol
//!
//! Every WebSocket text frame carries exactly one UTF-8 JSON object with a
//! `type` discriminator and an optional `payload`. Client frames are decoded
//! by hand rather than through a derived tagged enum so the router can tell
//! an unknown `type` (`UNKNOWN_MESSAGE`) apart from a malformed payload
//! (`INVALID_JSON`). The two cases get different error replies and neither
//! disconnects the client.
//!
//! Server frames are serialize-only and use derived adjacent tagging.

use serde::{Deserialize, Serialize};

use crate::shared::event::{DrawEvent, EventBody};

/// Protocol error codes carried by `ERROR` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidJson,
    UnknownMessage,
    NotJoined,
    Unauthorized,
    JoinFailed,
    DrawFailed,
    CreateFailed,
}

/// `HELLO` payload: the join handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloPayload {
    pub board_id: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub resume_from_seq: Option<i64>,
}

/// `CURSOR_MOVE` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorMovePayload {
    pub x: f64,
    pub y: f64,
}

/// `CREATE_BOARD` payload. Creation always requires a verified token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoardPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    pub clerk_token: String,
}

/// A decoded client → server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Hello(HelloPayload),
    Draw(EventBody),
    CursorMove(CursorMovePayload),
    Ping,
    LeaveBoard,
    CreateBoard(CreateBoardPayload),
}

/// Why a client frame failed to decode.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Not JSON, not an object, or a payload that does not match its type.
    Invalid(String),
    /// Well-formed frame with a `type` the protocol does not know.
    Unknown(String),
}

impl FrameError {
    /// The `ERROR` code this decode failure maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Invalid(_) => ErrorCode::InvalidJson,
            Self::Unknown(_) => ErrorCode::UnknownMessage,
        }
    }
}

/// Decode one inbound text frame.
pub fn decode_client_frame(text: &str) -> Result<ClientMessage, FrameError> {
    #[derive(Deserialize)]
    struct Raw {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        payload: serde_json::Value,
    }

    let raw: Raw =
        serde_json::from_str(text).map_err(|e| FrameError::Invalid(e.to_string()))?;

    fn payload<T: serde::de::DeserializeOwned>(
        value: serde_json::Value,
    ) -> Result<T, FrameError> {
        serde_json::from_value(value).map_err(|e| FrameError::Invalid(e.to_string()))
    }

    match raw.kind.as_str() {
        "HELLO" => Ok(ClientMessage::Hello(payload(raw.payload)?)),
        "DRAW_EVENT" => Ok(ClientMessage::Draw(payload(raw.payload)?)),
        "CURSOR_MOVE" => Ok(ClientMessage::CursorMove(payload(raw.payload)?)),
        "PING" => Ok(ClientMessage::Ping),
        "LEAVE_BOARD" => Ok(ClientMessage::LeaveBoard),
        "CREATE_BOARD" => Ok(ClientMessage::CreateBoard(payload(raw.payload)?)),
        other => Err(FrameError::Unknown(other.to_string())),
    }
}

/// Last known cursor position of a user, with the submission timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    pub x: f64,
    pub y: f64,
    /// Wall-clock milliseconds of the most recent move.
    pub t: i64,
}

/// Ephemeral per-user state within a room, as sent in `USER_LIST` and
/// `USER_JOIN`. Lives only in memory; one record per `(board, user)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub user_id: String,
    pub display_name: String,
    pub is_anonymous: bool,
    pub avatar_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorState>,
    /// Wall-clock milliseconds when the connection joined.
    pub connected_at: i64,
}

/// Snapshot descriptor inside `SYNC_SNAPSHOT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    /// Base64-encoded PNG.
    pub image_data: String,
    pub seq: i64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// One entry of a `CURSOR_BATCH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorEntry {
    pub user_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_color: Option<String>,
    pub x: f64,
    pub y: f64,
}

/// A server → client message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Welcome {
        user_id: String,
        display_name: String,
        avatar_color: String,
    },
    #[serde(rename_all = "camelCase")]
    SyncSnapshot {
        board_id: String,
        events: Vec<DrawEvent>,
        last_seq: i64,
        is_delta: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<SnapshotInfo>,
    },
    DrawEvent(DrawEvent),
    #[serde(rename_all = "camelCase")]
    CursorBatch {
        board_id: String,
        cursors: Vec<CursorEntry>,
    },
    #[serde(rename_all = "camelCase")]
    UserList {
        board_id: String,
        users: Vec<Presence>,
    },
    #[serde(rename_all = "camelCase")]
    UserJoin { board_id: String, user: Presence },
    #[serde(rename_all = "camelCase")]
    UserLeave { board_id: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    BoardCreated {
        board_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        is_private: bool,
    },
    #[serde(rename_all = "camelCase")]
    AccessDenied { board_id: String, reason: String },
    Error { code: ErrorCode, message: String },
    Pong,
}

impl ServerMessage {
    /// Shorthand for an `ERROR` frame.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// Serialize to the one-object-per-frame wire form.
    ///
    /// Serialization of these types cannot fail in practice; if it ever does
    /// the frame degrades to a generic `ERROR` so the connection still gets
    /// a well-formed object.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("[Protocol] failed to serialize server frame: {e}");
            r#"{"type":"ERROR","payload":{"code":"INVALID_JSON","message":"internal serialization failure"}}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::event::{DeletePayload, EventBody};

    #[test]
    fn hello_frame_decodes_with_defaults() {
        let msg = decode_client_frame(r#"{"type":"HELLO","payload":{"boardId":"b1"}}"#).unwrap();
        match msg {
            ClientMessage::Hello(h) => {
                assert_eq!(h.board_id, "b1");
                assert!(h.auth_token.is_none());
                assert!(!h.is_anonymous);
                assert!(h.resume_from_seq.is_none());
            }
            other => panic!("expected HELLO, got {other:?}"),
        }
    }

    #[test]
    fn ping_frame_needs_no_payload() {
        assert_eq!(
            decode_client_frame(r#"{"type":"PING"}"#).unwrap(),
            ClientMessage::Ping
        );
        assert_eq!(
            decode_client_frame(r#"{"type":"PING","payload":{}}"#).unwrap(),
            ClientMessage::Ping
        );
    }

    #[test]
    fn unknown_type_is_distinguished_from_bad_json() {
        let unknown = decode_client_frame(r#"{"type":"TELEPORT","payload":{}}"#).unwrap_err();
        assert_eq!(unknown.code(), ErrorCode::UnknownMessage);

        let invalid = decode_client_frame("{not json").unwrap_err();
        assert_eq!(invalid.code(), ErrorCode::InvalidJson);

        // Known type with a payload of the wrong shape is INVALID_JSON too.
        let bad_shape =
            decode_client_frame(r#"{"type":"CURSOR_MOVE","payload":{"x":"left"}}"#).unwrap_err();
        assert_eq!(bad_shape.code(), ErrorCode::InvalidJson);
    }

    #[test]
    fn draw_frame_carries_nested_event_body() {
        let msg = decode_client_frame(
            r#"{"type":"DRAW_EVENT","payload":{"type":"delete","payload":{"strokeIds":["a"]}}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Draw(EventBody::Delete(DeletePayload {
                stroke_ids: vec!["a".into()],
            }))
        );
    }

    #[test]
    fn server_frames_use_screaming_snake_tags() {
        let frame = ServerMessage::Pong.to_frame();
        assert_eq!(frame, r#"{"type":"PONG"}"#);

        let err = ServerMessage::error(ErrorCode::NotJoined, "join a board first").to_frame();
        let value: serde_json::Value = serde_json::from_str(&err).unwrap();
        assert_eq!(value["type"], "ERROR");
        assert_eq!(value["payload"]["code"], "NOT_JOINED");
    }

    #[test]
    fn sync_snapshot_omits_absent_snapshot_field() {
        let msg = ServerMessage::SyncSnapshot {
            board_id: "b1".into(),
            events: vec![],
            last_seq: 47,
            is_delta: true,
            snapshot: None,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_frame()).unwrap();
        assert_eq!(value["payload"]["lastSeq"], 47);
        assert_eq!(value["payload"]["isDelta"], true);
        assert!(value["payload"].get("snapshot").is_none());
    }

    #[test]
    fn presence_cursor_is_optional_on_the_wire() {
        let presence = Presence {
            user_id: "u1".into(),
            display_name: "Anonymous Otter".into(),
            is_anonymous: true,
            avatar_color: "#e07a5f".into(),
            cursor: None,
            connected_at: 0,
        };
        let value = serde_json::to_value(&presence).unwrap();
        assert!(value.get("cursor").is_none());
        assert_eq!(value["displayName"], "Anonymous Otter");
    }
}
