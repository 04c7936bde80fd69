use crate::config::AuthConfig;
use crate::domain::auth::{Claims, Password, TokenKey, TokenKind, TokenPair};
use crate::error::{AppError, Result};
use uuid::Uuid;

/// Mints and validates the two token classes and hashes passwords.
///
/// Verification is a pure function of the token and the configured secrets,
/// so the service is freely cloned into request handlers.
#[derive(Clone, Debug)]
pub struct CredentialService {
    access: TokenKey,
    refresh: TokenKey,
}

impl CredentialService {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access: TokenKey::new(TokenKind::Access, &config.access_token_secret, config.access_token_ttl_secs),
            refresh: TokenKey::new(TokenKind::Refresh, &config.refresh_token_secret, config.refresh_token_ttl_secs),
        }
    }

    #[tracing::instrument(err, skip(self, password))]
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || Password::hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))?
    }

    #[tracing::instrument(err, skip(self, password, password_hash))]
    pub async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || Password::verify(&password, &password_hash))
            .await
            .map_err(|e| AppError::Internal(format!("password verification task failed: {e}")))?
    }

    /// Issues a fresh access/refresh pair for the user.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if signing fails.
    #[tracing::instrument(err, skip(self, username), fields(user_id = %user_id))]
    pub fn generate_tokens(&self, user_id: Uuid, username: &str) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.access.issue(user_id, username)?,
            refresh_token: self.refresh.issue(user_id, username)?,
        })
    }

    #[must_use]
    pub fn verify_access_token(&self, token: &str) -> Option<Claims> {
        self.access.verify(token)
    }

    #[must_use]
    pub fn verify_refresh_token(&self, token: &str) -> Option<Claims> {
        self.refresh.verify(token)
    }

    #[must_use]
    pub const fn refresh_ttl_secs(&self) -> u64 {
        self.refresh.ttl_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_service() -> CredentialService {
        CredentialService::new(&AuthConfig {
            access_token_secret: "access_secret".to_string(),
            refresh_token_secret: "refresh_secret".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604_800,
            refresh_cookie_name: "refreshToken".to_string(),
            min_password_length: 6,
        })
    }

    #[test]
    fn test_generated_access_token_verifies() {
        let service = setup_service();
        let user_id = Uuid::new_v4();

        let pair = service.generate_tokens(user_id, "alice").unwrap();
        let claims = service.verify_access_token(&pair.access_token).unwrap();

        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_generated_refresh_token_verifies() {
        let service = setup_service();
        let user_id = Uuid::new_v4();

        let pair = service.generate_tokens(user_id, "alice").unwrap();
        let claims = service.verify_refresh_token(&pair.refresh_token).unwrap();

        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.exp - claims.iat, 604_800);
    }

    #[test]
    fn test_token_kinds_are_separated() {
        let service = setup_service();
        let pair = service.generate_tokens(Uuid::new_v4(), "alice").unwrap();

        assert!(service.verify_access_token(&pair.refresh_token).is_none());
        assert!(service.verify_refresh_token(&pair.access_token).is_none());
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let service = setup_service();
        let foreign = TokenKey::new(TokenKind::Access, "someone_else", 900);
        let token = foreign.issue(Uuid::new_v4(), "mallory").unwrap();

        assert!(service.verify_access_token(&token).is_none());
    }

    #[tokio::test]
    async fn test_password_hashing() {
        let service = setup_service();
        let hash = service.hash_password("secret1").await.unwrap();

        assert!(service.verify_password("secret1", &hash).await.unwrap());
        assert!(!service.verify_password("secret2", &hash).await.unwrap());
    }
}
