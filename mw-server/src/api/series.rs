//! Series detail lookup
//!
//! Thin proxy over the upstream client's single-series fetch. A merged id
//! is followed once so callers always get a current record, with the merge
//! target reported alongside it.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::upstream::{FetchOutcome, SeriesRecord};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    #[serde(default = "default_full")]
    pub full: bool,
}

fn default_full() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub data: SeriesRecord,
    /// Set when the requested id was merged into another series
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_with: Option<u64>,
}

/// GET /api/series/{id}
pub async fn get_series(
    State(state): State<AppState>,
    Path(series_id): Path<u64>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<Json<SeriesResponse>> {
    match state.upstream.fetch(series_id, query.full).await? {
        FetchOutcome::Found(record) => Ok(Json(SeriesResponse {
            data: record,
            merged_with: None,
        })),
        FetchOutcome::Redirected(target) => {
            match state.upstream.fetch(target, query.full).await? {
                FetchOutcome::Found(record) => Ok(Json(SeriesResponse {
                    data: record,
                    merged_with: Some(target),
                })),
                _ => Err(ApiError::NotFound(format!(
                    "merge target {target} not found"
                ))),
            }
        }
        FetchOutcome::NotFound => Err(ApiError::NotFound(format!(
            "series {series_id} not found"
        ))),
    }
}

/// Build series routes
pub fn series_routes() -> Router<AppState> {
    Router::new().route("/api/series/:id", get(get_series))
}
