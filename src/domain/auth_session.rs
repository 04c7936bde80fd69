use crate::domain::user::UserProfile;

/// Result of a successful register, login or refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub(crate) user: UserProfile,
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
}
