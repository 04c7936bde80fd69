use crate::domain::user::UserProfile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields are optional so that absent values reach validation and produce a
/// 400 with a readable message instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct Registration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Either `username` or `email` identifies the account.
#[derive(Debug, Deserialize)]
pub struct Login {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Login {
    #[must_use]
    pub fn identifier(&self) -> Option<String> {
        self.username.clone().filter(|u| !u.is_empty()).or_else(|| self.email.clone())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub profile_picture: Option<String>,
}

impl From<UserProfile> for User {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            email: profile.email,
            profile_picture: profile.profile_picture,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct CurrentUser {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct Logout {
    pub message: &'static str,
}
