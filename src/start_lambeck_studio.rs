//! Startup helpers for the Lambeck Studio server.

use std::process::ExitCode;
use std::sync::Arc;

use crate::core::config::StudioConfig;
use crate::core::errors::StudioResult;
use crate::server::{self, AppState};
use crate::storage::Database;

/// Run the server until Ctrl+C (used by the `lambeck-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Lambeck Studio v{}", env!("CARGO_PKG_VERSION"));

    let config = match StudioConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let addr = match config.server.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid bind address: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let state = match rt.block_on(initialize(&config)) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to create state: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server_with_shutdown(
        state,
        addr,
        &config.server.static_dir,
        shutdown_signal(),
    )) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

/// Open storage and build application state without starting the server.
///
/// # Errors
/// Returns an error if the database cannot be opened.
pub async fn initialize(config: &StudioConfig) -> StudioResult<Arc<AppState>> {
    let db = Database::open(&config.storage).await?;
    Ok(AppState::new(&db, &config.models))
}

/// Resolve once Ctrl+C is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl+C handler failed: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}
