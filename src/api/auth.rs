use crate::api::AppState;
use crate::api::cookies::{cleared_refresh_cookie, read_refresh_token, refresh_cookie};
use crate::api::middleware::AuthUser;
use crate::api::schemas::auth::{AuthSession as AuthSessionSchema, CurrentUser, Login, Logout, Registration};
use crate::domain::auth_session::AuthSession;
use crate::error::Result;
use crate::services::account_service::Registration as RegistrationInput;
use axum::{Json, extract::State, extract::rejection::JsonRejection, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: std::result::Result<Json<Registration>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    let session = state
        .account_service
        .register(RegistrationInput { username: payload.username, email: payload.email, password: payload.password })
        .await?;

    Ok(respond_with_session(&state, jar, session))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: std::result::Result<Json<Login>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload?;
    let session = state.account_service.login(payload.identifier(), payload.password).await?;

    Ok(respond_with_session(&state, jar, session))
}

pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    let token = read_refresh_token(&state.config.auth, &jar);
    let session = state.account_service.refresh(token).await?;

    Ok(respond_with_session(&state, jar, session))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    state.account_service.logout();
    let jar = jar.add(cleared_refresh_cookie(&state.config.auth, state.config.environment.is_production()));
    (jar, Json(Logout { message: "Logged out successfully" }))
}

pub async fn me(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let profile = state.account_service.current_user(auth_user.user_id).await?;
    Ok(Json(CurrentUser { user: profile.into() }))
}

fn respond_with_session(state: &AppState, jar: CookieJar, session: AuthSession) -> (CookieJar, Json<AuthSessionSchema>) {
    let secure = state.config.environment.is_production();
    let jar = jar.add(refresh_cookie(&state.config.auth, secure, session.refresh_token));
    let body = AuthSessionSchema {
        user: session.user.into(),
        access_token: session.access_token,
        message: state.account_service.demo_notice(),
    };
    (jar, Json(body))
}
