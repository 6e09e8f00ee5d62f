//! Connection sessions
//!
//! One session per WebSocket connection, advancing through
//! `New → Joined → Closed`. The session owns the connection's rate-limit
//! buckets and its half of the outbound frame queue; a writer task owns the
//! socket sink so that fan-out from any thread only ever pushes onto the
//! queue and per-recipient write order is serialized in one place.
//!
//! Message routing (the protocol router of the wire contract) lives in
//! [`Session::handle_frame`]; the HELLO handshake and sync delivery in
//! [`Session::handle_hello`]. Incoming protocol-level ping frames are
//! answered by axum's WebSocket layer itself; the JSON `PING` message is
//! answered here.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::auth::{self, BoardAccess, UserIdentity};
use crate::backend::limiter::{ConnectionLimiter, MessageClass};
use crate::backend::presence::{ConnId, FrameSender};
use crate::backend::realtime::fanout;
use crate::backend::server::state::AppState;
use crate::backend::store::{boards, events, snapshots, Board, StoreError};
use crate::shared::event::EventBody;
use crate::shared::protocol::{
    decode_client_frame, ClientMessage, CreateBoardPayload, ErrorCode, HelloPayload,
    ServerMessage, SnapshotInfo,
};

/// Upgrade handler mounted at `/`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Whether the read loop should continue after a frame.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

enum Phase {
    New,
    Joined {
        board_id: String,
        identity: UserIdentity,
    },
}

struct Session {
    conn_id: ConnId,
    state: AppState,
    tx: FrameSender,
    phase: Phase,
    limiter: ConnectionLimiter,
}

/// Drive one accepted WebSocket until it closes, then run the (idempotent)
/// leave path.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    tracing::debug!(%conn_id, "[Session] connection established");

    // Writer task: sole owner of the socket sink. Exits when every sender
    // clone is gone (session end) or the peer stops accepting writes.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session {
        conn_id,
        state: state.clone(),
        tx,
        phase: Phase::New,
        limiter: ConnectionLimiter::new(&state.config.rate_limits),
    };

    while let Some(incoming) = ws_rx.next().await {
        match incoming {
            Ok(Message::Text(text)) => {
                if session.handle_frame(text.as_str()).await == Flow::Stop {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // binary frames and ping/pong control frames
            Err(e) => {
                tracing::debug!(%conn_id, "[Session] socket error: {e}");
                break;
            }
        }
    }

    // Closed: leave the room and tell the peers. Safe to reach twice.
    if let Some(outcome) = state.rooms.leave(conn_id) {
        tracing::info!(
            %conn_id,
            board_id = %outcome.board_id,
            user_id = %outcome.user_id,
            "[Session] connection left board"
        );
        if outcome.presence_removed {
            fanout::broadcast(
                &state.rooms,
                &outcome.board_id,
                &ServerMessage::UserLeave {
                    board_id: outcome.board_id.clone(),
                    user_id: outcome.user_id.clone(),
                },
                None,
            );
        }
    }

    // Dropping the session drops the last queue sender; the writer drains
    // what is already queued and exits.
    drop(session);
    let _ = writer.await;
    tracing::debug!(%conn_id, "[Session] connection closed");
}

impl Session {
    fn send(&self, message: &ServerMessage) {
        // A closed queue means the writer is gone; the read loop will
        // observe the dead socket momentarily.
        let _ = self.tx.send(message.to_frame());
    }

    fn send_error(&self, code: ErrorCode, message: impl Into<String>) {
        self.send(&ServerMessage::error(code, message));
    }

    /// The protocol router: decode one frame and dispatch by type and phase.
    async fn handle_frame(&mut self, text: &str) -> Flow {
        let message = match decode_client_frame(text) {
            Ok(message) => message,
            Err(e) => {
                // Input errors keep the connection open.
                let code = e.code();
                match e {
                    crate::shared::protocol::FrameError::Invalid(detail) => {
                        self.send_error(code, format!("could not parse message: {detail}"));
                    }
                    crate::shared::protocol::FrameError::Unknown(kind) => {
                        self.send_error(code, format!("unknown message type: {kind}"));
                    }
                }
                return Flow::Continue;
            }
        };

        match message {
            ClientMessage::Ping => {
                self.send(&ServerMessage::Pong);
                Flow::Continue
            }
            ClientMessage::Hello(hello) => self.handle_hello(hello).await,
            ClientMessage::CreateBoard(create) => self.handle_create_board(create).await,
            ClientMessage::LeaveBoard => Flow::Stop,
            ClientMessage::Draw(body) => match &self.phase {
                Phase::New => {
                    self.send_error(ErrorCode::NotJoined, "send HELLO before drawing");
                    Flow::Continue
                }
                Phase::Joined { board_id, identity } => {
                    let board_id = board_id.clone();
                    let user_id = identity.user_id.clone();
                    self.handle_draw(&board_id, &user_id, body).await;
                    Flow::Continue
                }
            },
            ClientMessage::CursorMove(cursor) => match &self.phase {
                Phase::New => {
                    self.send_error(ErrorCode::NotJoined, "send HELLO before moving the cursor");
                    Flow::Continue
                }
                Phase::Joined { .. } => {
                    self.handle_cursor_move(cursor.x, cursor.y);
                    Flow::Continue
                }
            },
        }
    }

    /// HELLO handshake: verify → load-or-create board → access check →
    /// sequencer init → identity → join → WELCOME → sync → USER_LIST →
    /// USER_JOIN broadcast.
    async fn handle_hello(&mut self, hello: HelloPayload) -> Flow {
        if matches!(self.phase, Phase::Joined { .. }) {
            self.send_error(ErrorCode::JoinFailed, "connection already joined a board");
            return Flow::Continue;
        }

        let verified = self.state.verifier.verify(hello.auth_token.as_deref());

        let board = match load_or_create_board(&self.state, &hello.board_id).await {
            Ok(board) => board,
            Err(e) => {
                tracing::warn!(board_id = %hello.board_id, "[Session] join failed: {e}");
                self.send_error(ErrorCode::JoinFailed, "could not load board");
                return Flow::Continue;
            }
        };

        if let BoardAccess::Denied { reason } =
            auth::check_board_access(&board, verified.as_deref())
        {
            tracing::info!(
                board_id = %board.id,
                "[Session] access denied on private board"
            );
            self.send(&ServerMessage::AccessDenied {
                board_id: board.id,
                reason,
            });
            return Flow::Continue; // remain in New
        }

        if let Err(e) = self.state.sequencer.ensure_initialized(&board.id).await {
            tracing::warn!(board_id = %board.id, "[Session] sequencer init failed: {e}");
            self.send_error(ErrorCode::JoinFailed, "could not prepare board");
            return Flow::Continue;
        }

        let identity = auth::resolve_identity(
            verified,
            hello.client_id,
            hello.display_name,
            hello.is_anonymous,
        );

        let presence =
            self.state
                .rooms
                .join(self.conn_id, &board.id, &identity, self.tx.clone());
        tracing::info!(
            board_id = %board.id,
            user_id = %identity.user_id,
            display_name = %identity.display_name,
            "[Session] user joined board"
        );

        self.send(&ServerMessage::Welcome {
            user_id: identity.user_id.clone(),
            display_name: identity.display_name.clone(),
            avatar_color: identity.avatar_color.clone(),
        });

        match build_sync_message(&self.state, &board.id, hello.resume_from_seq).await {
            Ok(sync) => self.send(&sync),
            Err(e) => {
                // The join already happened; a client without sync is
                // useless, so fail the connection and let cleanup run.
                tracing::error!(board_id = %board.id, "[Session] sync delivery failed: {e}");
                self.send_error(ErrorCode::JoinFailed, "could not deliver board sync");
                return Flow::Stop;
            }
        }

        self.send(&ServerMessage::UserList {
            board_id: board.id.clone(),
            users: self.state.rooms.presences(&board.id),
        });

        fanout::broadcast(
            &self.state.rooms,
            &board.id,
            &ServerMessage::UserJoin {
                board_id: board.id.clone(),
                user: presence,
            },
            Some(self.conn_id),
        );

        self.phase = Phase::Joined {
            board_id: board.id,
            identity,
        };
        Flow::Continue
    }

    /// Draw path: rate limit → sequence → fan-out (from inside the
    /// sequencer's critical section) → compaction trigger.
    async fn handle_draw(&mut self, board_id: &str, user_id: &str, body: EventBody) {
        if !self.limiter.allow(MessageClass::Draw) {
            return; // silent drop by contract
        }

        let rooms = self.state.rooms.clone();
        let result = self
            .state
            .sequencer
            .sequence(board_id, user_id, body, |event| {
                fanout::broadcast(
                    &rooms,
                    &event.board_id,
                    &ServerMessage::DrawEvent(event.clone()),
                    None, // the sender receives its own event too
                );
            })
            .await;

        match result {
            Ok(event) => {
                self.state.compactor.maybe_schedule(board_id, event.seq);
            }
            Err(e) => {
                // Transient or invariant failure: either way no fan-out
                // happened and the reserved seq was rolled back.
                self.send_error(ErrorCode::DrawFailed, "could not persist draw event");
                if !e.is_retriable() {
                    tracing::error!(board_id, "[Session] draw rejected: {e}");
                }
            }
        }
    }

    /// Cursor path: rate limit → presence update → batch queue. Lossy by
    /// contract; the batcher tick broadcasts at most one frame per board
    /// per tick.
    fn handle_cursor_move(&mut self, x: f64, y: f64) {
        if !self.limiter.allow(MessageClass::Cursor) {
            return;
        }

        if let Some(update) = self.state.rooms.update_cursor(self.conn_id, x, y) {
            self.state.cursors.queue(
                &update.board_id,
                &update.user_id,
                &update.display_name,
                &update.avatar_color,
                x,
                y,
            );
        }
    }

    /// Explicit creation over the socket. Requires a verified token; the
    /// caller becomes the owner.
    async fn handle_create_board(&mut self, create: CreateBoardPayload) -> Flow {
        let Some(owner) = self.state.verifier.verify(Some(&create.clerk_token)) else {
            self.send_error(
                ErrorCode::Unauthorized,
                "board creation requires a verified token",
            );
            return Flow::Continue;
        };

        let board_id = Uuid::new_v4().to_string();
        let created = boards::create_board(
            &self.state.db,
            &board_id,
            create.name.as_deref(),
            Some(&owner),
            create.is_private,
        )
        .await;

        match created {
            Ok(board) => {
                if let Err(e) = self.state.sequencer.ensure_initialized(&board.id).await {
                    tracing::warn!(board_id = %board.id, "[Session] sequencer init failed: {e}");
                }
                tracing::info!(board_id = %board.id, %owner, "[Session] board created");
                self.send(&ServerMessage::BoardCreated {
                    board_id: board.id,
                    name: board.name,
                    is_private: board.is_private,
                });
            }
            Err(e) => {
                tracing::warn!("[Session] board creation failed: {e}");
                self.send_error(ErrorCode::CreateFailed, "could not create board");
            }
        }
        Flow::Continue
    }
}

/// Load a board, creating it as public and ownerless when first referenced
/// by HELLO. A concurrent creator winning the insert race is fine: the row
/// is re-read.
async fn load_or_create_board(state: &AppState, board_id: &str) -> Result<Board, StoreError> {
    if let Some(board) = boards::get_board(&state.db, board_id).await? {
        return Ok(board);
    }

    match boards::create_board(&state.db, board_id, None, None, false).await {
        Ok(board) => {
            tracing::info!(board_id, "[Session] board implicitly created");
            Ok(board)
        }
        Err(StoreError::Database(sqlx::Error::Database(db))) if db.is_unique_violation() => {
            boards::get_board(&state.db, board_id)
                .await?
                .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
        }
        Err(e) => Err(e),
    }
}

/// Assemble the `SYNC_SNAPSHOT` for a fresh join per the delivery policy:
/// delta when the client resumes, snapshot + tail when one exists, full
/// replay otherwise. `last_seq` is always included so the client can resume
/// later.
pub async fn build_sync_message(
    state: &AppState,
    board_id: &str,
    resume_from_seq: Option<i64>,
) -> Result<ServerMessage, StoreError> {
    let last_seq = events::max_seq(&state.db, board_id).await?;

    if let Some(resume) = resume_from_seq.filter(|&seq| seq > 0) {
        let events = events::events_after(&state.db, board_id, resume).await?;
        return Ok(ServerMessage::SyncSnapshot {
            board_id: board_id.to_string(),
            events,
            last_seq,
            is_delta: true,
            snapshot: None,
        });
    }

    if let Some(stored) = snapshots::get_snapshot(&state.db, board_id).await? {
        let events = events::events_after(&state.db, board_id, stored.seq).await?;
        return Ok(ServerMessage::SyncSnapshot {
            board_id: board_id.to_string(),
            events,
            last_seq,
            is_delta: false,
            snapshot: Some(SnapshotInfo {
                image_data: stored.image_data,
                seq: stored.seq,
                offset_x: stored.offset_x,
                offset_y: stored.offset_y,
            }),
        });
    }

    let events = events::events(&state.db, board_id).await?;
    Ok(ServerMessage::SyncSnapshot {
        board_id: board_id.to_string(),
        events,
        last_seq,
        is_delta: false,
        snapshot: None,
    })
}
