#![allow(dead_code)]
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use tokio::net::TcpListener;
use vidagent_server::AppBuilder;
use vidagent_server::adapters::memory::MemoryUserStore;
use vidagent_server::api::{self, MgmtState};
use vidagent_server::services::user_store::UserStore;
use vidagent_server::config::{
    AuthConfig, Config, DatabaseConfig, Environment, HealthConfig, LogFormat, RateLimitConfig, ServerConfig,
    TelemetryConfig,
};

static INIT: Once = Once::new();

pub const PASSWORD: &str = "password123";

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("vidagent_server=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    Config {
        environment: Environment::Development,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            mgmt_port: 0,
            shutdown_timeout_secs: 1,
            trusted_proxies: vec!["127.0.0.1/32".parse().unwrap(), "::1/128".parse().unwrap()],
        },
        database: DatabaseConfig {
            database_url: None,
            demo_mode: true,
            db_max_connections: 5,
            db_min_connections: 0,
            db_acquire_timeout_secs: 5,
            db_idle_timeout_secs: 600,
            db_max_lifetime_secs: 1800,
        },
        auth: AuthConfig {
            access_token_secret: "test_access_secret".to_string(),
            refresh_token_secret: "test_refresh_secret".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604_800,
            refresh_cookie_name: "refreshToken".to_string(),
            min_password_length: 6,
        },
        rate_limit: RateLimitConfig { per_second: 10_000, burst: 10_000, auth_per_second: 10_000, auth_burst: 10_000 },
        health: HealthConfig { store_timeout_ms: 500 },
        telemetry: TelemetryConfig { log_format: LogFormat::Text, otlp_endpoint: None },
    }
}

/// A running server backed by the in-memory user store.
pub struct TestApp {
    pub config: Config,
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub users: Arc<MemoryUserStore>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        let users = Arc::new(MemoryUserStore::new());
        Self::spawn_with_store(config, users.clone(), users).await
    }

    /// Serves `store`; `users` stays reachable for tests that poke the demo store directly.
    pub async fn spawn_with_store(config: Config, users: Arc<MemoryUserStore>, store: Arc<dyn UserStore>) -> Self {
        setup_tracing();

        let app = AppBuilder::new(config.clone()).with_user_store(store).build().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_url = format!("http://{}", listener.local_addr().unwrap());
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        let router = api::app_router(config.clone(), app.services);
        let mgmt_router = api::mgmt_router(MgmtState { health_service: app.health_service });

        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        Self { config, server_url, mgmt_url, client: Self::cookie_client(), users }
    }

    /// A fresh client with its own cookie jar.
    pub fn cookie_client() -> reqwest::Client {
        reqwest::Client::builder().cookie_store(true).build().unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    pub async fn register(&self, client: &reqwest::Client, username: &str) -> serde_json::Value {
        let resp = client
            .post(self.url("/auth/register"))
            .json(&serde_json::json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": PASSWORD,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK, "registration of {username} failed");
        resp.json().await.unwrap()
    }
}

pub fn unique_username(prefix: &str) -> String {
    format!("{prefix}_{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

/// Reads a `Set-Cookie` header for the given cookie name.
pub fn set_cookie_header(resp: &reqwest::Response, name: &str) -> Option<String> {
    resp.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_string)
}
