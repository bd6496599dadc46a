//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::poller::PollerStatus;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (e.g., "ok")
    pub status: String,
    /// Module name ("mw-server")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Configured poll interval; <= 0 means polling is disabled
    pub poll_interval_sec: i64,
    /// Background poller state, including the latest pass error if any
    pub poller: PollerStatus,
}

/// GET /health
///
/// Returns uptime and poller diagnostics for monitoring.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let poller = state.poller.read().await.clone();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "mw-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        poll_interval_sec: state.settings.poll_interval_sec,
        poller,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
}
