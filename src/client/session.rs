use crate::client::error::ClientError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Partial profile change merged into the stored user. `None` fields are left as they are.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
}

impl UserUpdate {
    pub(crate) fn apply(self, user: &mut SessionUser) {
        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(picture) = self.profile_picture {
            user.profile_picture = Some(picture);
        }
    }
}

/// What a client holds while authenticated. The refresh token never appears here;
/// it lives in the HTTP cookie store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub user: SessionUser,
    pub access_token: String,
}

impl SessionData {
    #[must_use]
    pub fn has_current_token(&self) -> bool {
        access_token_is_current(&self.access_token)
    }
}

/// Storage for the client session. `None` from [`SessionProvider::get`] means anonymous.
#[async_trait]
pub trait SessionProvider: Send + Sync + fmt::Debug {
    async fn get(&self) -> Result<Option<SessionData>, ClientError>;
    async fn set(&self, session: SessionData) -> Result<(), ClientError>;
    async fn clear(&self) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
pub struct MemorySessionProvider {
    inner: RwLock<Option<SessionData>>,
}

impl MemorySessionProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn get(&self) -> Result<Option<SessionData>, ClientError> {
        Ok(self.inner.read().await.clone())
    }

    async fn set(&self, session: SessionData) -> Result<(), ClientError> {
        *self.inner.write().await = Some(session);
        Ok(())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        *self.inner.write().await = None;
        Ok(())
    }
}

/// Persists the session as JSON so it survives process restarts.
#[derive(Debug, Clone)]
pub struct FileSessionProvider {
    path: PathBuf,
}

impl FileSessionProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionProvider for FileSessionProvider {
    async fn get(&self) -> Result<Option<SessionData>, ClientError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, session: SessionData) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_vec_pretty(&session)?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<u64>,
}

/// Local, signature-free check of a JWT: three segments, a decodable JSON payload,
/// and an `exp` that has not passed. A payload without `exp` is treated as current.
#[must_use]
pub fn access_token_is_current(token: &str) -> bool {
    access_token_is_current_at(token, crate::domain::auth::unix_now())
}

fn access_token_is_current_at(token: &str, now: u64) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return false;
    };

    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) else {
        return false;
    };
    let Ok(claim) = serde_json::from_slice::<ExpiryClaim>(&bytes) else {
        return false;
    };

    claim.exp.is_none_or(|exp| exp >= now)
}
