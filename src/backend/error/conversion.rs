//! Error-to-response conversion
//!
//! Lets handlers return `Result<_, BackendError>` directly: the error is
//! rendered as `{"error": <message>, "status": <code>}` with the matching
//! HTTP status.

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::backend::error::types::BackendError;

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        if matches!(self, BackendError::Store(_) | BackendError::Serialization(_)) {
            tracing::error!("[Api] internal error: {self}");
        }

        let status = self.status_code();
        let message = self.message();

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap_or_else(
                |_| format!(r#"{{"error":"{}","status":{}}}"#, message, status.as_u16()),
            )))
            .unwrap_or_else(|_| {
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Body::from("Internal Server Error"))
                    .expect("static fallback response")
            })
    }
}
