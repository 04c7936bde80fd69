//! Client-side session handling for consumers of the auth API.

mod api_client;
mod error;
mod session;

pub use api_client::ApiClient;
pub use error::ClientError;
pub use session::{
    FileSessionProvider, MemorySessionProvider, SessionData, SessionProvider, SessionUser, UserUpdate,
    access_token_is_current,
};
