//! Watchlist management endpoints
//!
//! CRUD over the tracked series plus the progress/status/preference
//! patches and the manual refresh trigger. Every mutation is a
//! load-modify-save cycle against the JSON store.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::engine::PassSummary;
use crate::models::{
    PreferencesPatch, ProgressPatch, SeriesStatus, StatusPatch, TrackedItem, WatchlistAdd,
};
use crate::storage::WatchlistStore;
use crate::upstream::{FetchOutcome, SeriesRecord};
use crate::{ApiError, ApiResult, AppState};

/// Watchlist entry as served, with the derived unread fields attached
#[derive(Debug, Serialize)]
pub struct AnnotatedItem {
    #[serde(flatten)]
    pub item: TrackedItem,
    pub unread: u64,
    pub is_behind: bool,
}

impl From<TrackedItem> for AnnotatedItem {
    fn from(item: TrackedItem) -> Self {
        let unread = item.unread();
        Self {
            item,
            unread,
            is_behind: unread > 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<SeriesStatus>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub data: Vec<AnnotatedItem>,
}

/// GET /api/watchlist
pub async fn list_watchlist(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<ListResponse> {
    let data = state
        .watchlist
        .load()
        .into_iter()
        .filter(|it| query.status.map_or(true, |s| it.status == s))
        .map(AnnotatedItem::from)
        .collect();
    Json(ListResponse { data })
}

#[derive(Debug, Serialize)]
pub struct AddResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /api/watchlist
///
/// Adds a series, hydrating title/count/cover from upstream on a
/// best-effort basis (an unreachable upstream still adds the item). One
/// merge redirect is followed so a freshly merged id lands on its target.
pub async fn add_to_watchlist(
    State(state): State<AppState>,
    Json(payload): Json<WatchlistAdd>,
) -> ApiResult<Json<AddResponse>> {
    let mut items = state.watchlist.load();
    if WatchlistStore::find(&items, payload.id).is_some() {
        return Ok(Json(AddResponse {
            ok: true,
            message: Some("Already in watchlist".to_string()),
        }));
    }

    let (sid, record) = hydrate(&state, payload.id).await;

    let record = record.unwrap_or_default();
    let now = mw_common::time::now();
    let item = TrackedItem {
        id: sid,
        title: payload
            .title
            .or(record.title)
            .unwrap_or_default(),
        total_chapters: payload.total_chapters.or(record.total_chapters),
        last_read: payload.last_read.unwrap_or(0),
        status: payload.status.unwrap_or_default(),
        notifications: payload.notifications.unwrap_or_default(),
        cover: record.cover,
        added_at: now,
        last_chapter_at: record.last_updated_at,
        last_checked: now,
    };

    info!(series_id = item.id, title = %item.title, "added series to watchlist");
    items.push(item);
    state.watchlist.save(&items)?;
    Ok(Json(AddResponse {
        ok: true,
        message: None,
    }))
}

/// Best-effort upstream lookup for a new watchlist entry, following one
/// merge redirect. Failures yield no record rather than an error.
async fn hydrate(state: &AppState, id: u64) -> (u64, Option<SeriesRecord>) {
    match state.upstream.fetch(id, true).await {
        Ok(FetchOutcome::Found(record)) => (id, Some(record)),
        Ok(FetchOutcome::Redirected(target)) => match state.upstream.fetch(target, true).await {
            Ok(FetchOutcome::Found(record)) => (target, Some(record)),
            _ => (id, None),
        },
        Ok(FetchOutcome::NotFound) => {
            debug!(series_id = id, "series not found upstream while adding");
            (id, None)
        }
        Err(err) => {
            warn!(series_id = id, error = %err, "hydration fetch failed while adding");
            (id, None)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

/// DELETE /api/watchlist/{id}
pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    Path(series_id): Path<u64>,
) -> ApiResult<Json<RemovedResponse>> {
    let mut items = state.watchlist.load();
    let before = items.len();
    items.retain(|it| it.id != series_id);
    let removed = before - items.len();
    if removed > 0 {
        state.watchlist.save(&items)?;
        info!(series_id, "removed series from watchlist");
    }
    Ok(Json(RemovedResponse { removed }))
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub ok: bool,
    pub last_read: u64,
}

/// PATCH /api/watchlist/{id}/progress
pub async fn patch_progress(
    State(state): State<AppState>,
    Path(series_id): Path<u64>,
    Json(body): Json<ProgressPatch>,
) -> ApiResult<Json<ProgressResponse>> {
    let mut items = state.watchlist.load();
    let item = WatchlistStore::find_mut(&mut items, series_id)
        .ok_or_else(|| ApiError::NotFound("Not in watchlist".to_string()))?;

    if body.mark_latest == Some(true) {
        if let Some(total) = item.total_chapters {
            item.last_read = total;
        }
    } else if let Some(step) = body.decrement {
        item.last_read = item.last_read.saturating_sub(step.max(1));
    } else if let Some(last_read) = body.last_read {
        item.last_read = last_read;
    } else {
        return Err(ApiError::BadRequest(
            "No recognized progress action".to_string(),
        ));
    }

    item.last_checked = mw_common::time::now();
    let last_read = item.last_read;
    state.watchlist.save(&items)?;
    Ok(Json(ProgressResponse { ok: true, last_read }))
}

/// POST /api/watchlist/{id}/read/next
pub async fn read_next(
    State(state): State<AppState>,
    Path(series_id): Path<u64>,
) -> ApiResult<Json<ProgressResponse>> {
    let mut items = state.watchlist.load();
    let item = WatchlistStore::find_mut(&mut items, series_id)
        .ok_or_else(|| ApiError::NotFound("Not in watchlist".to_string()))?;

    item.last_read += 1;
    item.last_checked = mw_common::time::now();
    let last_read = item.last_read;
    state.watchlist.save(&items)?;
    Ok(Json(ProgressResponse { ok: true, last_read }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub status: SeriesStatus,
}

/// PATCH /api/watchlist/{id}/status
pub async fn patch_status(
    State(state): State<AppState>,
    Path(series_id): Path<u64>,
    Json(body): Json<StatusPatch>,
) -> ApiResult<Json<StatusResponse>> {
    let mut items = state.watchlist.load();
    let item = WatchlistStore::find_mut(&mut items, series_id)
        .ok_or_else(|| ApiError::NotFound("Not in watchlist".to_string()))?;

    item.status = body.status;
    item.last_checked = mw_common::time::now();
    let status = item.status;
    state.watchlist.save(&items)?;
    Ok(Json(StatusResponse { ok: true, status }))
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub ok: bool,
    pub notifications: crate::models::NotificationPreferences,
}

/// GET /api/watchlist/{id}/notifications
pub async fn get_preferences(
    State(state): State<AppState>,
    Path(series_id): Path<u64>,
) -> ApiResult<Json<PreferencesResponse>> {
    let items = state.watchlist.load();
    let item = WatchlistStore::find(&items, series_id)
        .ok_or_else(|| ApiError::NotFound("Not in watchlist".to_string()))?;
    Ok(Json(PreferencesResponse {
        ok: true,
        notifications: item.notifications,
    }))
}

/// PATCH /api/watchlist/{id}/notifications
pub async fn patch_preferences(
    State(state): State<AppState>,
    Path(series_id): Path<u64>,
    Json(body): Json<PreferencesPatch>,
) -> ApiResult<Json<PreferencesResponse>> {
    let mut items = state.watchlist.load();
    let item = WatchlistStore::find_mut(&mut items, series_id)
        .ok_or_else(|| ApiError::NotFound("Not in watchlist".to_string()))?;

    body.apply(&mut item.notifications);
    item.last_checked = mw_common::time::now();
    let notifications = item.notifications;
    state.watchlist.save(&items)?;
    Ok(Json(PreferencesResponse {
        ok: true,
        notifications,
    }))
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub ok: bool,
    pub imported: usize,
    pub skipped: usize,
}

/// POST /api/watchlist/import
///
/// Bulk-import an exported watchlist. Entries that fail to parse or whose
/// id is already tracked are skipped rather than failing the import.
pub async fn import_watchlist(
    State(state): State<AppState>,
    Json(payload): Json<Vec<Value>>,
) -> ApiResult<Json<ImportResponse>> {
    let mut items = state.watchlist.load();
    let mut imported = 0;
    let mut skipped = 0;

    for entry in payload {
        let Ok(item) = serde_json::from_value::<TrackedItem>(entry) else {
            skipped += 1;
            continue;
        };
        if WatchlistStore::find(&items, item.id).is_some() {
            skipped += 1;
            continue;
        }
        items.push(item);
        imported += 1;
    }

    state.watchlist.save(&items)?;
    info!(imported, skipped, "imported watchlist entries");
    Ok(Json(ImportResponse {
        ok: true,
        imported,
        skipped,
    }))
}

/// POST /api/watchlist/refresh
///
/// Manual trigger: runs one reconciliation pass synchronously and returns
/// the same summary a scheduled pass produces. Individual item failures are
/// absorbed by the engine; an error here means the pass could not persist.
pub async fn refresh_now(State(state): State<AppState>) -> ApiResult<Json<PassSummary>> {
    let summary = state
        .engine
        .run_pass()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(summary))
}

/// Build watchlist routes
pub fn watchlist_routes() -> Router<AppState> {
    Router::new()
        .route("/api/watchlist", get(list_watchlist).post(add_to_watchlist))
        .route("/api/watchlist/import", post(import_watchlist))
        .route("/api/watchlist/refresh", post(refresh_now))
        .route("/api/watchlist/:id", delete(remove_from_watchlist))
        .route("/api/watchlist/:id/progress", patch(patch_progress))
        .route("/api/watchlist/:id/read/next", post(read_next))
        .route("/api/watchlist/:id/status", patch(patch_status))
        .route(
            "/api/watchlist/:id/notifications",
            get(get_preferences).patch(patch_preferences),
        )
}
