//! HTTP server: liveness plus a JSON API over the ledger.
//!
//! Serves the balance/bet endpoints and a text-command endpoint that
//! mirrors the chat front-end. CORS enabled for browser clients.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use tower_http::cors::CorsLayer;
use tracing::info;

pub use routes::{AppState, ServerState};

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/api/balance/:user_id", get(routes::get_balance))
        .route("/api/accounts/:user_id", get(routes::get_account))
        .route("/api/bet", post(routes::place_bet))
        .route("/api/command", post(routes::command))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(state: AppState, host: &str, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
