//! HTTP surface: routes, handlers, and the listener loop.
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /` | [`crate::convert::convert_request`] |
//! | `GET /healthcheck` | unconditional `200 OK` |
//!
//! The only state shared between handlers is the immutable
//! [`ServerConfig`] behind an `Arc`.

use crate::config::ServerConfig;
use crate::convert::convert_request;
use crate::error::{RequestError, ServerError};
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
}

/// Build the application router for `config`.
///
/// The request body limit follows `config.max_upload_bytes`; with no limit
/// configured axum's default multipart cap is disabled entirely.
pub fn router(config: ServerConfig) -> Router {
    let body_limit = match config.max_upload_bytes {
        Some(bytes) => DefaultBodyLimit::max(bytes),
        None => DefaultBodyLimit::disable(),
    };
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/", post(convert_handler))
        .route("/healthcheck", get(healthcheck))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn convert_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, RequestError> {
    convert_request(&state.config, request).await
}

async fn healthcheck() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "OK")
}

/// Bind `config.bind` and serve until SIGINT/SIGTERM.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;
    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;
    serve_with_listener(listener, config, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// In-flight responses are allowed to finish after `shutdown` fires.
pub async fn serve_with_listener<F>(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().map_err(ServerError::Serve)?;
    info!(
        "Listening on http://{} (extractor: {})",
        addr,
        config.extractor.display()
    );

    axum::serve(listener, router(config))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}
