pub mod account_service;
pub mod credential_service;
pub mod health_service;
pub mod rate_limit_service;
pub mod user_store;
