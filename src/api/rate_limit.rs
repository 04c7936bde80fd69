use crate::api::AppState;
use crate::services::rate_limit_service::RateLimitTier;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

async fn record_decision(state: &AppState, tier: RateLimitTier, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let retry_after = response.headers().get("x-ratelimit-after").and_then(|v| v.to_str().ok());
    state.rate_limit_service.record(tier, response.status(), retry_after);
    response
}

/// Wraps the credential routes' governor layer.
pub async fn record_auth_tier(State(state): State<AppState>, req: Request, next: Next) -> Response {
    record_decision(&state, RateLimitTier::Auth, req, next).await
}

/// Wraps the session routes' governor layer.
pub async fn record_standard_tier(State(state): State<AppState>, req: Request, next: Next) -> Response {
    record_decision(&state, RateLimitTier::Standard, req, next).await
}
