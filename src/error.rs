use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Authentication failed: {0}")]
    AuthError(&'static str),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Underlying cause of a 5xx response, attached as a response extension.
///
/// Only surfaced to clients by [`crate::api::middleware::expose_error_details`],
/// which is installed outside production.
#[derive(Clone, Debug)]
pub struct ErrorDetails {
    pub message: String,
    pub cause: String,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, cause) = match self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), Some(e.to_string()))
            }
            Self::AuthError(msg) => {
                tracing::debug!(message = msg, "Authentication failed");
                (StatusCode::UNAUTHORIZED, msg.to_string(), None)
            }
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, msg, None)
            }
            Self::Conflict(msg) => {
                tracing::debug!(message = %msg, "Conflict");
                (StatusCode::CONFLICT, msg, None)
            }
            Self::Internal(cause) => {
                tracing::error!(cause = %cause, "Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), Some(cause))
            }
        };

        let body = Json(json!({
            "error": message
        }));

        let mut response = (status, body).into_response();
        if let Some(cause) = cause {
            response.extensions_mut().insert(ErrorDetails { message, cause });
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_is_unauthorized() {
        let response = AppError::AuthError("Unauthorized").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<ErrorDetails>().is_none());
    }

    #[test]
    fn test_internal_error_carries_details() {
        let response = AppError::Internal("hash task panicked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let details = response.extensions().get::<ErrorDetails>().cloned();
        let details = details.unwrap();
        assert_eq!(details.message, "Internal server error");
        assert_eq!(details.cause, "hash task panicked");
    }

    #[test]
    fn test_client_errors_map_to_4xx_without_details() {
        for (error, status) in [
            (AppError::BadRequest("Username is required".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("taken".into()), StatusCode::CONFLICT),
            (AppError::AuthError("Invalid refresh token"), StatusCode::UNAUTHORIZED),
        ] {
            let response = error.into_response();
            assert_eq!(response.status(), status);
            assert!(response.extensions().get::<ErrorDetails>().is_none());
        }
    }

    #[test]
    fn test_conflict_status() {
        let response = AppError::Conflict("taken".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
