//! HTTP server for the studio API.
//!
//! Provides REST endpoints for:
//! - Chat replies (placeholder backend)
//! - Conversations, messages, transcripts, export and import
//! - Settings
//! - Model file management

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiJson, ApiResult};
pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Build the full application: API routes, static UI fallback and layers.
#[must_use]
pub fn build_app(state: Arc<AppState>, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with graceful shutdown support.
///
/// The server will stop accepting new connections when `shutdown_signal` completes.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    addr: SocketAddr,
    static_dir: &Path,
    shutdown_signal: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_app(state, static_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Lambeck Studio listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}
