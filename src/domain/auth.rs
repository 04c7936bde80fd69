use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// The two token classes. Each kind is signed with its own secret, so a token
/// of one kind never verifies as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    #[must_use]
    pub fn new(user_id: Uuid, username: &str, ttl_secs: u64) -> Self {
        let now = unix_now();
        Self { user_id, username: username.to_string(), iat: now, exp: now.saturating_add(ttl_secs) }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signing and verification material for one [`TokenKind`].
#[derive(Clone)]
pub struct TokenKey {
    kind: TokenKind,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKey").field("kind", &self.kind).field("ttl_secs", &self.ttl_secs).finish_non_exhaustive()
    }
}

impl TokenKey {
    #[must_use]
    pub fn new(kind: TokenKind, secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            kind,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    #[must_use]
    pub const fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Signs a fresh claim set for the user, valid for this key's lifetime.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if encoding fails.
    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<String> {
        self.encode(&Claims::new(user_id, username, self.ttl_secs))
    }

    /// # Errors
    /// Returns `AppError::Internal` if encoding fails.
    pub fn encode(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign {} token: {e}", self.kind.as_str())))
    }

    /// Returns the claims if the signature, algorithm, expiry and claim shape all check out.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(kind = self.kind.as_str(), error = %e, "Token rejected");
                None
            }
        }
    }
}

#[derive(Debug)]
pub struct Password;

impl Password {
    /// # Errors
    /// Returns `AppError::Internal` if Argon2 fails.
    #[tracing::instrument(skip(password), level = "debug")]
    pub fn hash(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?
            .to_string();
        Ok(password_hash)
    }

    /// A wrong password is `Ok(false)`; only an unparseable hash is an error.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the stored hash is not a valid PHC string.
    pub fn verify(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("stored password hash is invalid: {e}")))?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }
}

pub(crate) fn unix_now() -> u64 {
    u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn access_key() -> TokenKey {
        TokenKey::new(TokenKind::Access, "access_secret", 900)
    }

    fn refresh_key() -> TokenKey {
        TokenKey::new(TokenKind::Refresh, "refresh_secret", 604_800)
    }

    #[test]
    fn test_claims_roundtrip() {
        let key = access_key();
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, "alice", 900);

        let token = key.encode(&claims).unwrap();
        let decoded = key.verify(&token).unwrap();

        assert_eq!(claims, decoded);
    }

    #[test]
    fn test_kinds_do_not_cross_verify() {
        let user_id = Uuid::new_v4();
        let access = access_key().issue(user_id, "alice").unwrap();
        let refresh = refresh_key().issue(user_id, "alice").unwrap();

        assert!(refresh_key().verify(&access).is_none());
        assert!(access_key().verify(&refresh).is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let key = access_key();
        let now = unix_now();
        let claims = Claims { user_id: Uuid::new_v4(), username: "alice".into(), iat: now - 120, exp: now - 1 };

        let token = key.encode(&claims).unwrap();
        assert!(key.verify(&token).is_none());
    }

    #[test]
    fn test_claims_expiry_saturates() {
        let claims = Claims::new(Uuid::new_v4(), "alice", u64::MAX);
        assert_eq!(claims.exp, u64::MAX);
        assert!(claims.iat > 0);
    }

    #[test]
    fn test_issue_sets_lifetime() {
        let key = refresh_key();
        let token = key.issue(Uuid::new_v4(), "bob").unwrap();
        let claims = key.verify(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, 604_800);
        assert_eq!(claims.username, "bob");
    }

    #[test]
    fn test_missing_username_rejected() {
        let key = access_key();
        let now = unix_now();
        let payload = json!({ "userId": Uuid::new_v4(), "iat": now, "exp": now + 60 });
        let token =
            encode(&Header::new(Algorithm::HS256), &payload, &EncodingKey::from_secret(b"access_secret")).unwrap();

        assert!(key.verify(&token).is_none());
    }

    #[test]
    fn test_non_string_user_id_rejected() {
        let key = access_key();
        let now = unix_now();
        let payload = json!({ "userId": 42, "username": "alice", "iat": now, "exp": now + 60 });
        let token =
            encode(&Header::new(Algorithm::HS256), &payload, &EncodingKey::from_secret(b"access_secret")).unwrap();

        assert!(key.verify(&token).is_none());
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(access_key().verify("not.a.jwt").is_none());
        assert!(access_key().verify("").is_none());
    }

    #[test]
    fn test_password_hashing() {
        let password = "password12345";
        let hash = Password::hash(password).unwrap();

        assert!(Password::verify(password, &hash).unwrap());
        assert!(!Password::verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_password_hash_is_salted() {
        let first = Password::hash("secret1").unwrap();
        let second = Password::hash("secret1").unwrap();

        assert_ne!(first, second);
        assert!(Password::verify("secret1", &second).unwrap());
    }

    #[test]
    fn test_invalid_stored_hash_is_error() {
        assert!(matches!(Password::verify("secret1", "not-a-phc-string"), Err(AppError::Internal(_))));
    }
}
