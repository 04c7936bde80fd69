use crate::domain::auth_session::AuthSession;
use crate::domain::user::{NewUser, User, UserProfile};
use crate::error::{AppError, Result};
use crate::services::credential_service::CredentialService;
use crate::services::user_store::UserStore;
use opentelemetry::{global, metrics::Counter};
use regex::Regex;
use std::fmt;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

pub const MISSING_FIELDS: &str = "Username, email, and password are required";
pub const INVALID_EMAIL: &str = "Invalid email format";
pub const USER_EXISTS: &str = "User with this email or username already exists";
pub const MISSING_CREDENTIALS: &str = "Username or email, and password are required";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const NO_REFRESH_TOKEN: &str = "No refresh token provided";
pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
pub const USER_UNAVAILABLE: &str = "User not found or inactive";
pub const UNAUTHORIZED: &str = "Unauthorized";

#[derive(Clone)]
struct AccountMetrics {
    users_registered_total: Counter<u64>,
    login_total: Counter<u64>,
    refresh_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl fmt::Debug for AccountMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountMetrics").finish_non_exhaustive()
    }
}

impl AccountMetrics {
    fn new() -> Self {
        let meter = global::meter("vidagent-server");
        Self {
            users_registered_total: meter
                .u64_counter("users_registered_total")
                .with_description("Total number of successful user registrations")
                .build(),
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of successful login attempts")
                .build(),
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Total number of successful token rotations")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Total number of logout requests")
                .build(),
        }
    }
}

#[derive(Debug)]
pub struct Registration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Account lifecycle on top of the credential service and the user store.
#[derive(Clone, Debug)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    credentials: CredentialService,
    min_password_length: usize,
    metrics: AccountMetrics,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, credentials: CredentialService, min_password_length: usize) -> Self {
        Self { users, credentials, min_password_length, metrics: AccountMetrics::new() }
    }

    /// Set when the backing store is not durable; surfaced to clients alongside auth responses.
    #[must_use]
    pub fn demo_notice(&self) -> Option<&'static str> {
        self.users.demo_notice()
    }

    #[tracing::instrument(
        skip(self, registration),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn register(&self, registration: Registration) -> Result<AuthSession> {
        let (Some(username), Some(email), Some(password)) =
            (non_empty(registration.username), non_empty(registration.email), non_empty(registration.password))
        else {
            return Err(AppError::BadRequest(MISSING_FIELDS.into()));
        };

        if !is_valid_email(&email) {
            return Err(AppError::BadRequest(INVALID_EMAIL.into()));
        }

        if password.chars().count() < self.min_password_length {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters long",
                self.min_password_length
            )));
        }

        if self.users.exists(&username, &email).await? {
            return Err(AppError::Conflict(USER_EXISTS.into()));
        }

        let password_hash = self.credentials.hash_password(&password).await?;
        let user = self.users.create(NewUser { username, email, password_hash }).await?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id()));

        let session = self.issue_session(&user)?;

        tracing::info!("User registered successfully");
        self.metrics.users_registered_total.add(1, &[]);

        Ok(session)
    }

    #[tracing::instrument(
        skip(self, login, password),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn login(&self, login: Option<String>, password: Option<String>) -> Result<AuthSession> {
        let (Some(login), Some(password)) = (non_empty(login), non_empty(password)) else {
            return Err(AppError::BadRequest(MISSING_CREDENTIALS.into()));
        };

        let Some(user) = self.users.find_by_login(&login).await? else {
            tracing::warn!("Login failed: user not found");
            return Err(AppError::AuthError(INVALID_CREDENTIALS));
        };

        tracing::Span::current().record("user_id", tracing::field::display(user.id()));

        if !self.credentials.verify_password(&password, &user.password_hash).await? {
            tracing::warn!("Login failed: invalid password");
            return Err(AppError::AuthError(INVALID_CREDENTIALS));
        }

        if !user.is_active() {
            tracing::warn!("Login failed: account inactive");
            return Err(AppError::AuthError(INVALID_CREDENTIALS));
        }

        let session = self.issue_session(&user)?;

        tracing::info!("User logged in successfully");
        self.metrics.login_total.add(1, &[]);

        Ok(session)
    }

    /// Exchanges a valid refresh token for a new access token and a rotated refresh token.
    #[tracing::instrument(
        skip(self, refresh_token),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn refresh(&self, refresh_token: Option<String>) -> Result<AuthSession> {
        let Some(refresh_token) = non_empty(refresh_token) else {
            return Err(AppError::AuthError(NO_REFRESH_TOKEN));
        };

        let claims =
            self.credentials.verify_refresh_token(&refresh_token).ok_or(AppError::AuthError(INVALID_REFRESH_TOKEN))?;

        tracing::Span::current().record("user_id", tracing::field::display(claims.user_id));

        let user = self.active_user(claims.user_id).await?.ok_or(AppError::AuthError(USER_UNAVAILABLE))?;
        let session = self.issue_session(&user)?;

        tracing::info!("Tokens rotated successfully");
        self.metrics.refresh_total.add(1, &[]);

        Ok(session)
    }

    /// Refresh tokens are stateless; logging out only needs the cookie cleared.
    #[tracing::instrument(skip(self))]
    pub fn logout(&self) {
        tracing::info!("User logged out");
        self.metrics.logout_total.add(1, &[]);
    }

    /// Loads the profile behind an already-verified access token.
    #[tracing::instrument(skip(self), fields(user_id = %user_id), err(level = "debug"))]
    pub async fn current_user(&self, user_id: Uuid) -> Result<UserProfile> {
        self.active_user(user_id).await?.map(|u| u.profile()).ok_or(AppError::AuthError(UNAUTHORIZED))
    }

    async fn active_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.find_by_id(user_id).await?.filter(User::is_active))
    }

    fn issue_session(&self, user: &User) -> Result<AuthSession> {
        let tokens = self.credentials.generate_tokens(user.id(), user.username())?;
        Ok(AuthSession { user: user.profile(), access_token: tokens.access_token, refresh_token: tokens.refresh_token })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot inside the domain.
static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}
