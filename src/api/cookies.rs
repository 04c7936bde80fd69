use crate::config::AuthConfig;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Builds the httpOnly cookie that carries the refresh token.
#[must_use]
pub fn refresh_cookie(config: &AuthConfig, secure: bool, token: String) -> Cookie<'static> {
    build(config, secure, token, i64::try_from(config.refresh_token_ttl_secs).unwrap_or(i64::MAX))
}

/// Same attributes as [`refresh_cookie`], empty and expiring immediately.
#[must_use]
pub fn cleared_refresh_cookie(config: &AuthConfig, secure: bool) -> Cookie<'static> {
    build(config, secure, String::new(), 0)
}

#[must_use]
pub fn read_refresh_token(config: &AuthConfig, jar: &CookieJar) -> Option<String> {
    jar.get(&config.refresh_cookie_name).map(|c| c.value().to_string())
}

fn build(config: &AuthConfig, secure: bool, value: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((config.refresh_cookie_name.clone(), value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}
