//! Board-management REST API
//!
//! All routes live under `/api` and require a verified bearer token via the
//! [`AuthUser`] extractor:
//!
//! - `GET    /api/boards`     - list boards owned by the caller
//! - `POST   /api/boards`     - create a board with a fresh UUID id
//! - `DELETE /api/boards/:id` - delete an owned board and its data
//!
//! Realtime clients never need these; they exist for dashboards and
//! tooling. Ownership failures on delete read as 404 so board ids stay
//! unprobeable.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;
use crate::backend::store::{boards, Board};

/// Add the `/api` routes to the router.
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/api/boards",
            axum::routing::get(list_boards).post(create_board),
        )
        .route("/api/boards/{id}", axum::routing::delete(delete_board))
}

/// List boards owned by the verified caller, newest first.
async fn list_boards(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Board>>, BackendError> {
    let boards = boards::user_boards(&state.db, &user.user_id).await?;
    Ok(Json(boards))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBoardRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_private: bool,
}

/// Create a board owned by the caller. The id is always a fresh UUID;
/// clients wanting a chosen id use the implicit HELLO path, which only
/// creates public boards.
async fn create_board(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateBoardRequest>,
) -> Result<(StatusCode, Json<Board>), BackendError> {
    let board_id = Uuid::new_v4().to_string();
    let board = boards::create_board(
        &state.db,
        &board_id,
        request.name.as_deref(),
        Some(&user.user_id),
        request.is_private,
    )
    .await?;

    state.sequencer.ensure_initialized(&board.id).await?;
    tracing::info!(board_id = %board.id, owner = %user.user_id, "[Api] board created");

    Ok((StatusCode::CREATED, Json(board)))
}

/// Delete an owned board together with its events and snapshot.
async fn delete_board(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, BackendError> {
    let deleted = boards::delete_board(&state.db, &id, &user.user_id).await?;
    if !deleted {
        return Err(BackendError::NotFound);
    }

    tracing::info!(board_id = %id, owner = %user.user_id, "[Api] board deleted");
    Ok(StatusCode::NO_CONTENT)
}
