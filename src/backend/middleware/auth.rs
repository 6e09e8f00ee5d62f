//! REST authentication extractor
//!
//! Board-management endpoints require a verified caller. [`AuthUser`]
//! extracts the `Authorization: Bearer …` header and verifies it against
//! the configured secret; handlers that take an `AuthUser` parameter are
//! thereby auth-required. There is no database-backed user table; the
//! token subject is the identity.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;

/// The verified caller of a REST request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = BackendError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("[Api] missing Authorization header");
                BackendError::unauthorized("missing Authorization header")
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            tracing::debug!("[Api] malformed Authorization header");
            BackendError::unauthorized("expected a Bearer token")
        })?;

        let user_id = state.verifier.verify(Some(token)).ok_or_else(|| {
            tracing::debug!("[Api] token failed verification");
            BackendError::unauthorized("invalid or expired token")
        })?;

        Ok(AuthUser { user_id })
    }
}
