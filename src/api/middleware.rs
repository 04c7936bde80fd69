use crate::api::AppState;
use crate::error::{AppError, ErrorDetails};
use crate::services::account_service::UNAUTHORIZED;
use axum::{
    Json,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Identity of the caller, taken from a valid `Authorization: Bearer` access token.
///
/// Every failure (no header, wrong scheme, bad signature, expired, refresh token
/// presented instead) is the same 401 so callers learn nothing about why.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AppError::AuthError(UNAUTHORIZED))?;

        let claims = state.credential_service.verify_access_token(token).ok_or(AppError::AuthError(UNAUTHORIZED))?;

        tracing::Span::current().record("user_id", tracing::field::display(claims.user_id));

        Ok(Self { user_id: claims.user_id, username: claims.username })
    }
}

/// Token from a `Bearer` credential. The scheme name is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Adds the hidden cause of 5xx responses to the JSON body. Installed outside production only.
pub async fn expose_error_details(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let Some(details) = response.extensions_mut().remove::<ErrorDetails>() else {
        return response;
    };

    let status = response.status();
    (status, Json(json!({ "error": details.message, "details": details.cause }))).into_response()
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string();
        id.parse().ok().map(RequestId::new)
    }
}
