//! Series search proxy
//!
//! Forwards title searches to the upstream API and applies the optional
//! status/type/content-rating/has-anime filters over the normalized
//! results.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::upstream::SeriesRecord;
use crate::{ApiError, ApiResult, AppState};
use mw_common::parse::{parse_bool_str, str_matches};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content_rating: Option<String>,
    /// Accepts the usual bool spellings ("true", "1", "yes", ...)
    pub has_anime: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub data: Vec<SeriesRecord>,
    pub count: usize,
}

/// GET /api/search
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    if query.q.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Search query cannot be empty".to_string(),
        ));
    }

    let results = state
        .upstream
        .search(&query.q, query.page, query.limit)
        .await?;

    let want_has_anime = query.has_anime.as_deref().and_then(parse_bool_str);
    let data: Vec<SeriesRecord> = results
        .into_iter()
        .filter(|record| {
            str_matches(record.status.as_deref(), query.status.as_deref())
                && str_matches(record.kind.as_deref(), query.kind.as_deref())
                && str_matches(
                    record.content_rating.as_deref(),
                    query.content_rating.as_deref(),
                )
                && match want_has_anime {
                    None => true,
                    Some(want) => record.has_anime == Some(want),
                }
        })
        .collect();

    let count = data.len();
    Ok(Json(SearchResponse { data, count }))
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/api/search", get(search))
}
