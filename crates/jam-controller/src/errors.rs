//! Jam Controller error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse`
//! impl, and to client-safe messages for the point-to-point `error` socket
//! frame. Internal details are logged server-side but not exposed to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Jam Controller error type.
///
/// Maps to HTTP status codes:
/// - `Forbidden`: 403
/// - `NotFound`: 404
/// - `SessionFull`: 409 Conflict
/// - `SessionEnded`: 410 Gone
/// - `Persistence`: 503 Service Unavailable
/// - `Internal`: 500
#[derive(Debug, Error)]
pub enum JcError {
    /// Role check failed for an admin-only operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Session (or other resource) not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Session roster is at its configured maximum.
    #[error("Session is full")]
    SessionFull,

    /// Mutation attempted on a session that has already ended.
    #[error("Session has ended")]
    SessionEnded,

    /// Session store call failed or timed out.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Internal error (actor mailbox closed, serialization failure, ...).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JcError {
    /// Returns the HTTP status code for this error (for metrics recording).
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            JcError::Forbidden(_) => 403,
            JcError::NotFound(_) => 404,
            JcError::SessionFull => 409,
            JcError::SessionEnded => 410,
            JcError::Persistence(_) => 503,
            JcError::Internal(_) => 500,
        }
    }

    /// Returns a client-safe error message (no internal details).
    ///
    /// Used for the point-to-point `error` socket frame; persistence and
    /// internal details are logged server-side only.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            JcError::Forbidden(msg) => msg.clone(),
            JcError::NotFound(resource) => resource.clone(),
            JcError::SessionFull => "Session is full".to_string(),
            JcError::SessionEnded => "Session has ended".to_string(),
            JcError::Persistence(_) => "The session could not be updated, please retry".to_string(),
            JcError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for JcError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            JcError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            JcError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            JcError::SessionFull => (StatusCode::CONFLICT, "SESSION_FULL"),
            JcError::SessionEnded => (StatusCode::GONE, "SESSION_ENDED"),
            JcError::Persistence(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "jc.store", error = %err, "Session store operation failed");
                (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_ERROR")
            }
            JcError::Internal(err) => {
                tracing::error!(target: "jc.internal", error = %err, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.client_message(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Convert sqlx errors to `JcError`.
impl From<sqlx::Error> for JcError {
    fn from(err: sqlx::Error) -> Self {
        JcError::Persistence(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(JcError::Forbidden("nope".to_string()).status_code(), 403);
        assert_eq!(JcError::NotFound("session".to_string()).status_code(), 404);
        assert_eq!(JcError::SessionFull.status_code(), 409);
        assert_eq!(JcError::SessionEnded.status_code(), 410);
        assert_eq!(JcError::Persistence("db".to_string()).status_code(), 503);
        assert_eq!(JcError::Internal("bug".to_string()).status_code(), 500);
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let persistence = JcError::Persistence("connection refused at 10.0.0.5:5432".to_string());
        assert!(!persistence.client_message().contains("10.0.0.5"));

        let internal = JcError::Internal("mailbox closed".to_string());
        assert_eq!(internal.client_message(), "An internal error occurred");
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", JcError::Forbidden("admins only".to_string())),
            "Forbidden: admins only"
        );
        assert_eq!(format!("{}", JcError::SessionFull), "Session is full");
        assert_eq!(format!("{}", JcError::SessionEnded), "Session has ended");
    }

    #[tokio::test]
    async fn test_into_response_session_full() {
        let response = JcError::SessionFull.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "SESSION_FULL");
        assert_eq!(body_json["error"]["message"], "Session is full");
    }

    #[tokio::test]
    async fn test_into_response_session_ended() {
        let response = JcError::SessionEnded.into_response();
        assert_eq!(response.status(), StatusCode::GONE);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "SESSION_ENDED");
    }

    #[tokio::test]
    async fn test_into_response_persistence_is_generic() {
        let response = JcError::Persistence("secret dsn".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "PERSISTENCE_ERROR");
        assert!(!body_json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("secret"));
    }

    #[tokio::test]
    async fn test_into_response_forbidden_keeps_reason() {
        let response =
            JcError::Forbidden("Only admins can end a session".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(
            body_json["error"]["message"],
            "Only admins can end a session"
        );
    }
}
