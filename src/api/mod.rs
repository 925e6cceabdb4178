//! HTTP API: a thin Axum JSON surface over the scanner.
//!
//! Exposes status, recent opportunities, execution statistics, the approval
//! queue, scanner start/stop and runtime policy updates. CORS is open for
//! local tooling.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

pub use routes::AppState;

/// Bind `port` and serve the API until the process exits.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {port}"))?;
    info!(port, "API server listening on http://localhost:{port}");

    axum::serve(listener, build_router(state))
        .await
        .context("API server error")
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/status", get(routes::get_status))
        .route("/api/opportunities", get(routes::get_opportunities))
        .route("/api/stats", get(routes::get_stats))
        .route("/api/approvals", get(routes::get_approvals))
        .route("/api/approvals/:network/:id/approve", post(routes::approve))
        .route("/api/approvals/:network/:id/reject", post(routes::reject))
        .route("/api/scanner/start", post(routes::start_scanner))
        .route("/api/scanner/stop", post(routes::stop_scanner))
        .route("/api/config", post(routes::update_config))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
