#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;

use crate::adapters::database::{DbPool, PgUserStore};
use crate::adapters::memory::MemoryUserStore;
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::account_service::AccountService;
use crate::services::credential_service::CredentialService;
use crate::services::health_service::HealthService;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::user_store::UserStore;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
}

/// Wires services together. Infrastructure is created by the caller and handed in.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    user_store: Option<Arc<dyn UserStore>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, user_store: None }
    }

    #[must_use]
    pub fn with_user_store(mut self, user_store: Arc<dyn UserStore>) -> Self {
        self.user_store = Some(user_store);
        self
    }

    /// # Errors
    /// Returns an error if the configuration is inconsistent or no user store was provided.
    pub fn build(self) -> anyhow::Result<App> {
        self.config.validate().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        let user_store = self.user_store.ok_or_else(|| anyhow::anyhow!("user store is required"))?;

        let credential_service = CredentialService::new(&self.config.auth);
        let account_service = AccountService::new(
            Arc::clone(&user_store),
            credential_service.clone(),
            self.config.auth.min_password_length,
        );
        let rate_limit_service = RateLimitService::new(self.config.server.trusted_proxies.clone());
        let health_service = HealthService::new(user_store, self.config.health.clone());

        Ok(App {
            services: ServiceContainer { account_service, credential_service, rate_limit_service },
            health_service,
        })
    }
}

/// Picks the account store for this process. Demo mode never touches the database.
///
/// # Errors
/// Returns an error if the database is unreachable or migrations fail.
pub async fn connect_user_store(config: &Config) -> anyhow::Result<Arc<dyn UserStore>> {
    if config.database.demo_mode {
        tracing::warn!("Demo mode enabled: accounts are held in memory and lost on restart");
        return Ok(Arc::new(MemoryUserStore::new()));
    }

    let url = config
        .database
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("a database URL is required unless demo mode is enabled"))?;
    let pool = adapters::database::init_pool(url, &config.database).await?;
    run_migrations(&pool).await?;

    Ok(Arc::new(PgUserStore::new(pool)))
}

/// # Errors
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach structured logs.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        tracing::error!(panic = %info, location = %location, "Panic occurred");
    }));
}
