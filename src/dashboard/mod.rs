//! Dashboard — Axum web server exposing the league read API.
//!
//! Every league read returns the pipeline envelope as JSON.
//! CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{ApiState, AppState};

/// Start the API server.
///
/// Binds the port up front so a taken port fails startup, then serves
/// on a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // League reads
        .route("/api/leagues/:id/rosters", get(routes::get_rosters))
        .route("/api/leagues/:id/matchups/:week", get(routes::get_matchups))
        .route("/api/leagues/:id/transactions/:week", get(routes::get_transactions))
        .route("/api/leagues/:id/traded-picks", get(routes::get_traded_picks))
        // Players & injuries
        .route("/api/players/enrich", get(routes::get_enriched_players))
        .route("/api/injuries", get(routes::get_injuries))
        .route("/api/status", get(routes::get_status))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
