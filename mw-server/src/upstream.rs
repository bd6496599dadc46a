//! Upstream series metadata client
//!
//! Talks to a MangaBaka-style series API and normalizes its loosely typed
//! JSON into [`SeriesRecord`] at this boundary. Nothing past this module
//! ever sees a raw payload: counts that fail to coerce become `None`, a
//! `state = "merged"` record becomes an explicit [`FetchOutcome::Redirected`],
//! and upstream "not found" is distinct from transient failure so the
//! reconciliation engine can treat them differently.

use async_trait::async_trait;
use mw_common::parse::{parse_bool, parse_count};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Timeout for upstream API requests
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(20);

/// Source keys scanned for a last-update timestamp when the top-level field
/// is absent, in preference order.
const SOURCE_KEYS: &[&str] = &[
    "anilist",
    "my_anime_list",
    "anime_news_network",
    "manga_updates",
    "kitsu",
    "shikimori",
    "mangadex",
];

/// Errors surfaced by the upstream client
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Timeout, connection failure, or upstream 5xx; worth retrying
    #[error("transient upstream failure: {0}")]
    Transient(String),

    /// Request the upstream rejected or a payload that cannot be used;
    /// retrying will not help
    #[error("invalid upstream request: {0}")]
    Invalid(String),
}

impl UpstreamError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transient(_))
    }
}

/// Normalized upstream series record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesRecord {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub total_chapters: Option<u64>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content_rating: Option<String>,
    pub has_anime: Option<bool>,
    pub state: Option<String>,
    pub merged_with: Option<u64>,
    pub cover: Option<String>,
    pub last_updated_at: Option<String>,
}

/// Outcome of fetching one series by id
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Current record for the requested id
    Found(SeriesRecord),
    /// The id does not exist upstream
    NotFound,
    /// The id has been superseded; re-fetch with the target id
    Redirected(u64),
}

/// Upstream metadata source
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Fetch the authoritative record for a series id.
    async fn fetch(&self, id: u64, full: bool) -> Result<FetchOutcome, UpstreamError>;

    /// Search series by title, returning normalized summary records.
    async fn search(
        &self,
        q: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<SeriesRecord>, UpstreamError>;
}

// ---------------------------------------------------------------------------
// Payload normalization
// ---------------------------------------------------------------------------

/// Unwrap the `{"data": ...}` envelope some endpoints use.
fn unwrap_envelope(payload: &Value) -> &Value {
    match payload.get("data") {
        Some(inner) if !inner.is_null() => inner,
        _ => payload,
    }
}

/// Pick a display cover URL out of the nested `cover` object.
fn pick_cover(series: &Value) -> Option<String> {
    let cover = series.get("cover")?;
    for key in ["small", "default", "raw"] {
        if let Some(url) = cover.get(key).and_then(Value::as_str) {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
    }
    None
}

/// Derive the series' last-update timestamp.
///
/// Prefers the top-level `last_updated_at`; otherwise scans the per-source
/// sub-objects in a fixed order. The value stays an opaque string.
fn derive_last_updated_at(series: &Value) -> Option<String> {
    if let Some(ts) = series.get("last_updated_at").and_then(Value::as_str) {
        if !ts.is_empty() {
            return Some(ts.to_string());
        }
    }
    let sources = series.get("source")?;
    for key in SOURCE_KEYS {
        if let Some(ts) = sources
            .get(key)
            .and_then(|s| s.get("last_updated_at"))
            .and_then(Value::as_str)
        {
            if !ts.is_empty() {
                return Some(ts.to_string());
            }
        }
    }
    None
}

fn non_empty_str(series: &Value, key: &str) -> Option<String> {
    series
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Normalize one raw series payload (enveloped or not) into a record.
pub fn normalize_series(payload: &Value) -> SeriesRecord {
    let series = unwrap_envelope(payload);
    SeriesRecord {
        id: parse_count(series.get("id")),
        title: non_empty_str(series, "title"),
        total_chapters: parse_count(series.get("total_chapters")),
        status: non_empty_str(series, "status"),
        kind: non_empty_str(series, "type"),
        content_rating: non_empty_str(series, "content_rating"),
        has_anime: parse_bool(series.get("has_anime")),
        state: non_empty_str(series, "state"),
        merged_with: parse_count(series.get("merged_with")),
        cover: pick_cover(series),
        last_updated_at: derive_last_updated_at(series),
    }
}

/// Map a normalized record to a fetch outcome, surfacing merges explicitly.
fn outcome_for(record: SeriesRecord) -> FetchOutcome {
    if record.state.as_deref() == Some("merged") {
        if let Some(target) = record.merged_with {
            return FetchOutcome::Redirected(target);
        }
    }
    FetchOutcome::Found(record)
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Reqwest-backed client for the MangaBaka series API
pub struct MangabakaClient {
    http: reqwest::Client,
    base: String,
}

impl MangabakaClient {
    /// Build a client for the given API base URL (no trailing slash).
    pub fn new(base: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(UPSTREAM_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// GET a JSON payload; `Ok(None)` is an upstream 404.
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Value>, UpstreamError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_server_error() {
            return Err(UpstreamError::Transient(format!(
                "upstream returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(UpstreamError::Invalid(format!(
                "upstream returned {status}"
            )));
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| UpstreamError::Invalid(format!("unparsable upstream payload: {e}")))?;
        Ok(Some(payload))
    }
}

/// Timeouts and transport failures are transient; a request that could not
/// even be built is not.
fn classify_reqwest_error(err: reqwest::Error) -> UpstreamError {
    if err.is_builder() {
        UpstreamError::Invalid(err.to_string())
    } else {
        UpstreamError::Transient(err.to_string())
    }
}

#[async_trait]
impl UpstreamClient for MangabakaClient {
    async fn fetch(&self, id: u64, full: bool) -> Result<FetchOutcome, UpstreamError> {
        if id == 0 {
            return Err(UpstreamError::Invalid(
                "series id must be positive".to_string(),
            ));
        }

        let url = if full {
            format!("{}/v1/series/{}/full", self.base, id)
        } else {
            format!("{}/v1/series/{}", self.base, id)
        };

        debug!(series_id = id, full, "fetching upstream series");
        match self.get_json(&url, &[]).await? {
            Some(payload) => Ok(outcome_for(normalize_series(&payload))),
            None => Ok(FetchOutcome::NotFound),
        }
    }

    async fn search(
        &self,
        q: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<SeriesRecord>, UpstreamError> {
        let q = q.trim();
        if q.is_empty() {
            return Err(UpstreamError::Invalid(
                "search query cannot be empty".to_string(),
            ));
        }
        // Defensive clamps mirroring the upstream API's own limits
        let q: String = q.chars().take(100).collect();
        let page = page.clamp(1, 1000);
        let limit = limit.clamp(1, 50);

        let url = format!("{}/v1/series/search", self.base);
        let payload = self
            .get_json(
                &url,
                &[
                    ("q", q),
                    ("page", page.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?
            .unwrap_or(Value::Null);

        let entries = payload
            .get("data")
            .or_else(|| payload.get("results"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(entries.iter().map(normalize_series).collect())
    }
}
