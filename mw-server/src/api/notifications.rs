//! Notification history and manual test endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::channels::broadcast;
use crate::models::NotificationRecord;
use crate::{ApiResult, AppState};

/// Default page size for the history listing
const DEFAULT_LIMIT: usize = 200;

/// Title used for manual test pushes
const TEST_PUSH_TITLE: &str = "MangaWatch";

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub data: Vec<NotificationRecord>,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 1000);
    let mut data = state.history.load();
    data.truncate(limit);
    Json(HistoryResponse { data })
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

/// DELETE /api/notifications/{id}
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<RemovedResponse>> {
    let removed = state.history.remove(id)?;
    Ok(Json(RemovedResponse { removed }))
}

/// DELETE /api/notifications
pub async fn clear_notifications(
    State(state): State<AppState>,
) -> ApiResult<Json<RemovedResponse>> {
    let removed = state.history.clear()?;
    Ok(Json(RemovedResponse { removed }))
}

#[derive(Debug, Serialize)]
pub struct DebugResponse {
    pub channels: Vec<ChannelDebug>,
}

#[derive(Debug, Serialize)]
pub struct ChannelDebug {
    pub name: String,
    pub configured: bool,
}

/// GET /api/notify/debug
///
/// Reports which channels have credentials without leaking them.
pub async fn notify_debug(State(state): State<AppState>) -> Json<DebugResponse> {
    let channels = state
        .channels
        .iter()
        .map(|c| ChannelDebug {
            name: c.name().to_string(),
            configured: c.configured(),
        })
        .collect();
    Json(DebugResponse { channels })
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub ok: bool,
    pub channels: std::collections::BTreeMap<String, bool>,
}

/// POST /api/notify/test
///
/// Sends a test message on every configured channel and records the
/// attempt in history. Responds 502 when nothing was delivered so a
/// misconfigured setup is visible from the probe itself.
pub async fn notify_test(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let message = "Manual test";
    let outcomes = broadcast(&state.channels, TEST_PUSH_TITLE, message).await;

    state.history.append(NotificationRecord::test(
        TEST_PUSH_TITLE,
        message,
        outcomes.clone(),
    ))?;

    let ok = outcomes.values().any(|delivered| *delivered);
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((
        status,
        Json(TestResponse {
            ok,
            channels: outcomes,
        }),
    ))
}

/// Build notification routes
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/notifications",
            get(list_notifications).delete(clear_notifications),
        )
        .route("/api/notifications/:id", delete(delete_notification))
        .route("/api/notify/debug", get(notify_debug))
        .route("/api/notify/test", post(notify_test))
}
