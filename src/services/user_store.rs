use crate::domain::user::{NewUser, User};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Account persistence consumed by the session core.
///
/// Implementations must report a duplicate username or email from [`UserStore::create`]
/// as `AppError::Conflict`.
#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Looks a user up by username, falling back to email.
    async fn find_by_login(&self, login: &str) -> Result<Option<User>>;

    /// Whether any account already uses this username or this email.
    async fn exists(&self, username: &str, email: &str) -> Result<bool>;

    async fn create(&self, new_user: NewUser) -> Result<User>;

    /// Cheap connectivity check used by the readiness probe.
    async fn ping(&self) -> Result<()>;

    /// Shown to clients when accounts are not durable.
    fn demo_notice(&self) -> Option<&'static str> {
        None
    }
}
