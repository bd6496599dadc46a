//! mw-server library — watchlist tracking and notification service
//!
//! Exposes the application state, router construction, and the
//! reconciliation core for integration testing.

pub mod api;
pub mod channels;
pub mod engine;
pub mod error;
pub mod models;
pub mod policy;
pub mod poller;
pub mod storage;
pub mod upstream;

pub use crate::error::{ApiError, ApiResult};

use crate::channels::NotificationChannel;
use crate::engine::Reconciler;
use crate::poller::PollerStatus;
use crate::storage::{HistoryStore, WatchlistStore};
use crate::upstream::UpstreamClient;
use axum::Router;
use chrono::{DateTime, Utc};
use mw_common::Settings;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub channels: Vec<Arc<dyn NotificationChannel>>,
    pub engine: Arc<Reconciler>,
    pub watchlist: WatchlistStore,
    pub history: HistoryStore,
    /// Background poller state, surfaced by the health endpoint
    pub poller: Arc<RwLock<PollerStatus>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire up state from resolved settings and the injectable
    /// collaborators (upstream client, notification channels).
    pub fn new(
        settings: Settings,
        upstream: Arc<dyn UpstreamClient>,
        channels: Vec<Arc<dyn NotificationChannel>>,
    ) -> Self {
        let watchlist = WatchlistStore::new(settings.watchlist_path());
        let history = HistoryStore::new(settings.notifications_path());
        let engine = Arc::new(Reconciler::new(
            Arc::clone(&upstream),
            channels.clone(),
            watchlist.clone(),
            history.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            upstream,
            channels,
            engine,
            watchlist,
            history,
            poller: Arc::new(RwLock::new(PollerStatus::default())),
            startup_time: Utc::now(),
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::watchlist_routes())
        .merge(api::search_routes())
        .merge(api::series_routes())
        .merge(api::notification_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
