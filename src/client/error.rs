use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Longest server message carried into an error before truncation.
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Rate limited, retry later")]
    RateLimited,

    #[error("Server error ({status}): {message}")]
    Server { status: StatusCode, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Session storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Request body cannot be replayed after a token refresh")]
    NotReplayable,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ClientError {
    /// Maps a non-success response to an error, preferring the server's `{"error": ...}` message.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body).map_or_else(|_| truncate(body), |b| b.error);
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            s if s.is_server_error() => Self::Server { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_uses_server_message() {
        let err = ClientError::from_status(StatusCode::UNAUTHORIZED, r#"{"error":"Invalid refresh token"}"#);
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Unauthorized: Invalid refresh token");

        let err = ClientError::from_status(StatusCode::CONFLICT, r#"{"error":"User already exists"}"#);
        assert!(matches!(err, ClientError::Rejected { status: StatusCode::CONFLICT, ref message } if message == "User already exists"));
    }

    #[test]
    fn test_from_status_truncates_raw_bodies() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH * 2);
        match ClientError::from_status(StatusCode::BAD_GATEWAY, &body) {
            ClientError::Server { message, .. } => {
                assert!(message.len() < body.len());
                assert!(message.ends_with("(1000 bytes)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_status_rate_limited() {
        assert!(matches!(ClientError::from_status(StatusCode::TOO_MANY_REQUESTS, ""), ClientError::RateLimited));
    }
}
