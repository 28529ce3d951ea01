//! # Kiosk API
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tracing ──► KioskConfig::load ──► Database (migrations) ──► gateway   │
//! │                                                                         │
//! │  ──► AppState ──► axum::serve ──► graceful shutdown on Ctrl+C/SIGTERM  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kiosk_api::{build_app, AppState, KioskConfig};
use kiosk_db::Database;
use kiosk_engine::HttpGateway;

const DEFAULT_LOG_FILTER: &str = "info,kiosk=debug,sqlx=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .init();

    info!("Starting Kiosk API server...");

    let config = KioskConfig::load()?;
    info!(
        port = config.server.port,
        database = %config.database.path.display(),
        gateway = %config.gateway.base_url,
        terminal_id = %config.gateway.terminal_id,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config()).await?;
    info!("Database ready");

    let gateway = HttpGateway::new(config.gateway_config())?;
    let state = AppState::new(db.clone(), Arc::new(gateway), &config);

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
