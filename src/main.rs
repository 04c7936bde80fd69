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

use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;
use vidagent_server::api::MgmtState;
use vidagent_server::config::Config;
use vidagent_server::{AppBuilder, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    config.validate().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    vidagent_server::setup_panic_hook();

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx) = async {
        // Phase 1: Infrastructure
        let user_store = vidagent_server::connect_user_store(&config).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        vidagent_server::spawn_signal_handler(shutdown_tx.clone());

        // Phase 2: Component wiring
        let app = AppBuilder::new(config.clone()).with_user_store(user_store).build()?;

        // Phase 3: Listeners and routers
        let app_router = vidagent_server::api::app_router(config.clone(), app.services);
        let mgmt_app = vidagent_server::api::mgmt_router(MgmtState { health_service: app.health_service });

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        tracing::info!(address = %api_addr, environment = ?config.environment, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        Ok::<_, anyhow::Error>((api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Serve until a shutdown signal arrives
    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = api_rx.wait_for(|&s| s).await;
        });

    let mut mgmt_rx = shutdown_rx.clone();
    let mgmt_server = axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = mgmt_rx.wait_for(|&s| s).await;
        });

    let servers = async { tokio::try_join!(api_server, mgmt_server) };
    tokio::pin!(servers);

    let mut signal_rx = shutdown_rx.clone();
    tokio::select! {
        res = &mut servers => {
            if let Err(e) = res {
                tracing::error!(error = %e, "Server error");
            }
        }
        _ = signal_rx.wait_for(|&s| s) => {
            // Connections still open after the grace period are dropped.
            let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
            match tokio::time::timeout(grace, &mut servers).await {
                Ok(Err(e)) => tracing::error!(error = %e, "Server error during shutdown"),
                Ok(Ok(_)) => {}
                Err(_) => tracing::warn!(timeout_secs = grace.as_secs(), "Graceful shutdown timed out"),
            }
        }
    }

    let _ = shutdown_tx.send(true);
    tracing::info!("Server stopped");

    telemetry_guard.shutdown();
    Ok(())
}
