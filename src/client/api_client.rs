//! HTTP client for the auth API.
//!
//! The refresh token travels only as an HttpOnly cookie, so the underlying
//! `reqwest::Client` keeps a cookie store. The access token and user profile are
//! held by a [`SessionProvider`].

use crate::client::error::ClientError;
use crate::client::session::{SessionData, SessionProvider, SessionUser, UserUpdate};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    user: SessionUser,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CurrentUserResponse {
    user: SessionUser,
}

/// Token attached to an outgoing request, and whether getting it already cost a refresh.
struct HeldToken {
    token: Option<String>,
    refreshed: bool,
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl ApiClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, session: Arc<dyn SessionProvider>) -> Result<Self, ClientError> {
        let http =
            Client::builder().cookie_store(true).timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS)).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url, session })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builds an unsent request against the API. Pass it to [`ApiClient::send_authorized`].
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn session(&self) -> Result<Option<SessionData>, ClientError> {
        self.session.get().await
    }

    /// Records an authenticated session locally.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn login(&self, user: SessionUser, access_token: String) -> Result<SessionData, ClientError> {
        let session = SessionData { user, access_token };
        self.session.set(session.clone()).await?;
        Ok(session)
    }

    /// # Errors
    /// Returns the server's rejection, or a transport/session store failure.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<SessionData, ClientError> {
        let response = self
            .http
            .post(self.url("/auth/register"))
            .json(&json!({ "username": username, "email": email, "password": password }))
            .send()
            .await?;
        self.accept_session(response).await
    }

    /// Signs in with a username or email.
    ///
    /// # Errors
    /// Returns the server's rejection, or a transport/session store failure.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<SessionData, ClientError> {
        let body = if identifier.contains('@') {
            json!({ "email": identifier, "password": password })
        } else {
            json!({ "username": identifier, "password": password })
        };
        let response = self.http.post(self.url("/auth/login")).json(&body).send().await?;
        self.accept_session(response).await
    }

    /// Exchanges the refresh cookie for a new session.
    ///
    /// # Errors
    /// Returns [`ClientError::Unauthorized`] when the cookie is missing or no longer accepted.
    pub async fn refresh(&self) -> Result<SessionData, ClientError> {
        let response = self.http.post(self.url("/auth/refresh")).send().await?;
        self.accept_session(response).await
    }

    /// Drops the local session and asks the server to clear the refresh cookie.
    ///
    /// # Errors
    /// Returns an error if the session store fails or the server call does not succeed.
    /// Local state is cleared either way.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.session.clear().await?;
        let response = self.http.post(self.url("/auth/logout")).send().await?;
        check_response(response).await?;
        Ok(())
    }

    /// Validates the stored access token without a network call; clears the session when it is unusable.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn check_auth(&self) -> Result<bool, ClientError> {
        let Some(session) = self.session.get().await? else {
            return Ok(false);
        };

        if session.has_current_token() {
            return Ok(true);
        }

        debug!(user = %session.user.username, "Stored access token is expired or malformed");
        self.session.clear().await?;
        Ok(false)
    }

    /// Returns the held access token, refreshing once when none is held.
    ///
    /// # Errors
    /// Returns transport or session store failures. A rejected refresh yields `Ok(None)`.
    pub async fn get_token(&self) -> Result<Option<String>, ClientError> {
        Ok(self.token_or_refresh().await?.token)
    }

    async fn token_or_refresh(&self) -> Result<HeldToken, ClientError> {
        if let Some(session) = self.session.get().await? {
            return Ok(HeldToken { token: Some(session.access_token), refreshed: false });
        }

        match self.refresh().await {
            Ok(session) => Ok(HeldToken { token: Some(session.access_token), refreshed: true }),
            Err(e) if e.is_unauthorized() => Ok(HeldToken { token: None, refreshed: true }),
            Err(e) => Err(e),
        }
    }

    /// Sends a request with the bearer token. At most one refresh happens per call: on a
    /// 401 the session is refreshed and the request retried once, unless obtaining the
    /// token already required a refresh. If no refresh can help, the session is cleared
    /// and the original 401 response is returned.
    ///
    /// # Errors
    /// Returns [`ClientError::NotReplayable`] for streaming bodies, or transport/session store failures.
    pub async fn send_authorized(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let retry = request.try_clone().ok_or(ClientError::NotReplayable)?;

        let held = self.token_or_refresh().await?;
        let request = match held.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if held.refreshed {
            debug!("Request rejected with a freshly refreshed token, clearing session");
            self.session.clear().await?;
            return Ok(response);
        }

        match self.refresh().await {
            Ok(session) => {
                debug!("Retrying request after token refresh");
                Ok(retry.bearer_auth(session.access_token).send().await?)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.session.clear().await?;
                Ok(response)
            }
        }
    }

    /// Merges profile changes into the stored user. The access token is left untouched.
    ///
    /// # Errors
    /// Returns an error if the session store fails. Without a session this is a no-op
    /// returning `Ok(None)`.
    pub async fn update_user(&self, update: UserUpdate) -> Result<Option<SessionData>, ClientError> {
        let Some(mut session) = self.session.get().await? else {
            return Ok(None);
        };
        update.apply(&mut session.user);
        self.session.set(session.clone()).await?;
        Ok(Some(session))
    }

    /// # Errors
    /// Returns [`ClientError::Unauthorized`] when no valid session can be established.
    pub async fn me(&self) -> Result<SessionUser, ClientError> {
        let response = self.send_authorized(self.request(Method::GET, "/auth/me")).await?;
        let response = check_response(response).await?;
        let body: CurrentUserResponse = response.json().await?;
        Ok(body.user)
    }

    async fn accept_session(&self, response: Response) -> Result<SessionData, ClientError> {
        let response = check_response(response).await?;
        let body: AuthResponse = response.json().await?;
        self.login(body.user, body.access_token).await
    }
}

async fn check_response(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::from_status(status, &body))
}
