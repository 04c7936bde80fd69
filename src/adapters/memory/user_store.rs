use crate::domain::user::{NewUser, User};
use crate::error::{AppError, Result};
use crate::services::user_store::UserStore;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use uuid::Uuid;

pub const DEMO_NOTICE: &str = "Demo mode: accounts are not persisted";

/// Process-local account store backing demo mode. Nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserStore {
    users: Arc<DashMap<Uuid, User>>,
    by_username: Arc<DashMap<String, Uuid>>,
    by_email: Arc<DashMap<String, Uuid>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the active flag. Returns `false` if the user does not exist.
    pub fn set_active(&self, id: Uuid, active: bool) -> bool {
        self.users.get_mut(&id).map(|mut user| user.is_active = active).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        let id = self.by_username.get(login).or_else(|| self.by_email.get(login)).map(|id| *id);
        Ok(id.and_then(|id| self.users.get(&id).map(|u| u.clone())))
    }

    async fn exists(&self, username: &str, email: &str) -> Result<bool> {
        Ok(self.by_username.contains_key(username) || self.by_email.contains_key(email))
    }

    async fn create(&self, new_user: NewUser) -> Result<User> {
        let conflict = || AppError::Conflict("User with this email or username already exists".into());

        // Both index entries are held while checking, so two concurrent
        // registrations cannot claim the same username or email.
        let Entry::Vacant(username_slot) = self.by_username.entry(new_user.username.clone()) else {
            return Err(conflict());
        };
        let Entry::Vacant(email_slot) = self.by_email.entry(new_user.email.clone()) else {
            return Err(conflict());
        };

        let user = User {
            id: Uuid::now_v7(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            profile_picture: None,
            is_active: true,
        };

        self.users.insert(user.id, user.clone());
        email_slot.insert(user.id);
        username_slot.insert(user.id);

        Ok(user)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn demo_notice(&self) -> Option<&'static str> {
        Some(DEMO_NOTICE)
    }
}
