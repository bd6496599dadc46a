//! Integration tests for the HTTP API
//!
//! Routes are exercised end-to-end through the router with a scripted
//! upstream and recording channels behind the application state.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{record, tracked, MockChannel, Scripted, ScriptedUpstream};
use mw_server::channels::NotificationChannel;
use mw_server::upstream::UpstreamClient;
use mw_server::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

struct TestApp {
    _dir: TempDir,
    state: AppState,
    upstream: Arc<ScriptedUpstream>,
    pushover: Arc<MockChannel>,
    discord: Arc<MockChannel>,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let settings = mw_common::Settings {
            data_dir: dir.path().to_path_buf(),
            port: 0,
            upstream_base: "https://api.example.dev".to_string(),
            poll_interval_sec: 0,
            pushover_app_token: None,
            pushover_user_key: None,
            discord_webhook_url: None,
        };

        let upstream = ScriptedUpstream::new();
        let pushover = MockChannel::new("pushover", true);
        let discord = MockChannel::new("discord", true);

        let state = AppState::new(
            settings,
            Arc::clone(&upstream) as Arc<dyn UpstreamClient>,
            vec![
                Arc::clone(&pushover) as Arc<dyn NotificationChannel>,
                Arc::clone(&discord) as Arc<dyn NotificationChannel>,
            ],
        );

        Self {
            _dir: dir,
            state,
            upstream,
            pushover,
            discord,
        }
    }

    fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    async fn request(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn request_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();
    let (status, body) = app.request("GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "mw-server");
    assert!(body["version"].is_string());
    assert_eq!(body["poll_interval_sec"], 0);
    assert_eq!(body["poller"]["passes_completed"], 0);
}

// =============================================================================
// Watchlist CRUD
// =============================================================================

#[tokio::test]
async fn test_add_hydrates_from_upstream_and_lists_annotated() {
    let app = TestApp::new();
    let mut upstream_record = record(270, "Berserk", Some(700));
    upstream_record.cover = Some("https://img.example/b.jpg".to_string());
    app.upstream.script(270, Scripted::Found(upstream_record));

    let (status, body) = app
        .request_json("POST", "/api/watchlist", json!({"id": 270, "last_read": 699}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, body) = app.request("GET", "/api/watchlist").await;
    assert_eq!(status, StatusCode::OK);
    let entry = &body["data"][0];
    assert_eq!(entry["id"], 270);
    assert_eq!(entry["title"], "Berserk");
    assert_eq!(entry["total_chapters"], 700);
    assert_eq!(entry["unread"], 1);
    assert_eq!(entry["is_behind"], true);
    assert_eq!(entry["cover"], "https://img.example/b.jpg");
}

#[tokio::test]
async fn test_add_is_best_effort_when_upstream_is_down() {
    let app = TestApp::new();
    app.upstream.script(99, Scripted::Transient);

    let (status, body) = app
        .request_json(
            "POST",
            "/api/watchlist",
            json!({"id": 99, "title": "offline add"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, body) = app.request("GET", "/api/watchlist").await;
    assert_eq!(body["data"][0]["title"], "offline add");
    assert!(body["data"][0]["total_chapters"].is_null());
}

#[tokio::test]
async fn test_add_follows_merge_redirect() {
    let app = TestApp::new();
    app.upstream.script(1, Scripted::Redirected(555));
    app.upstream
        .script(555, Scripted::Found(record(555, "merged", Some(10))));

    app.request_json("POST", "/api/watchlist", json!({"id": 1}))
        .await;

    let (_, body) = app.request("GET", "/api/watchlist").await;
    assert_eq!(body["data"][0]["id"], 555);
}

#[tokio::test]
async fn test_duplicate_add_reports_already_tracked() {
    let app = TestApp::new();
    app.state.watchlist.save(&[tracked(270, Some(1), 0)]).unwrap();

    let (status, body) = app
        .request_json("POST", "/api/watchlist", json!({"id": 270}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Already in watchlist");

    let (_, body) = app.request("GET", "/api/watchlist").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_remove_reports_count() {
    let app = TestApp::new();
    app.state.watchlist.save(&[tracked(1, None, 0)]).unwrap();

    let (status, body) = app.request("DELETE", "/api/watchlist/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, body) = app.request("DELETE", "/api/watchlist/1").await;
    assert_eq!(body["removed"], 0);
}

#[tokio::test]
async fn test_status_filter_on_listing() {
    let app = TestApp::new();
    let mut finished = tracked(1, None, 0);
    finished.status = mw_server::models::SeriesStatus::Finished;
    app.state
        .watchlist
        .save(&[finished, tracked(2, None, 0)])
        .unwrap();

    let (_, body) = app.request("GET", "/api/watchlist?status=finished").await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], 1);
}

// =============================================================================
// Progress / status / preference patches
// =============================================================================

#[tokio::test]
async fn test_progress_mark_latest() {
    let app = TestApp::new();
    app.state.watchlist.save(&[tracked(1, Some(42), 7)]).unwrap();

    let (status, body) = app
        .request_json(
            "PATCH",
            "/api/watchlist/1/progress",
            json!({"mark_latest": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["last_read"], 42);
}

#[tokio::test]
async fn test_progress_decrement_saturates_at_zero() {
    let app = TestApp::new();
    app.state.watchlist.save(&[tracked(1, Some(42), 2)]).unwrap();

    let (_, body) = app
        .request_json(
            "PATCH",
            "/api/watchlist/1/progress",
            json!({"decrement": 5}),
        )
        .await;
    assert_eq!(body["last_read"], 0);
}

#[tokio::test]
async fn test_progress_requires_an_action() {
    let app = TestApp::new();
    app.state.watchlist.save(&[tracked(1, Some(42), 2)]).unwrap();

    let (status, _) = app
        .request_json("PATCH", "/api/watchlist/1/progress", json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_progress_unknown_series_is_404() {
    let app = TestApp::new();
    let (status, _) = app
        .request_json(
            "PATCH",
            "/api/watchlist/9/progress",
            json!({"last_read": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_read_next_increments() {
    let app = TestApp::new();
    app.state.watchlist.save(&[tracked(1, Some(42), 2)]).unwrap();

    let (_, body) = app.request("POST", "/api/watchlist/1/read/next").await;
    assert_eq!(body["last_read"], 3);
}

#[tokio::test]
async fn test_status_patch() {
    let app = TestApp::new();
    app.state.watchlist.save(&[tracked(1, None, 0)]).unwrap();

    let (status, body) = app
        .request_json(
            "PATCH",
            "/api/watchlist/1/status",
            json!({"status": "on-hold"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "on-hold");
}

#[tokio::test]
async fn test_preferences_roundtrip() {
    let app = TestApp::new();
    app.state.watchlist.save(&[tracked(1, None, 0)]).unwrap();

    let (_, body) = app.request("GET", "/api/watchlist/1/notifications").await;
    assert_eq!(body["notifications"]["enabled"], true);

    let (_, body) = app
        .request_json(
            "PATCH",
            "/api/watchlist/1/notifications",
            json!({"discord": false}),
        )
        .await;
    assert_eq!(body["notifications"]["discord"], false);
    assert_eq!(body["notifications"]["pushover"], true);

    let (_, body) = app.request("GET", "/api/watchlist/1/notifications").await;
    assert_eq!(body["notifications"]["discord"], false);
}

// =============================================================================
// Import
// =============================================================================

#[tokio::test]
async fn test_import_skips_duplicates_and_garbage() {
    let app = TestApp::new();
    app.state.watchlist.save(&[tracked(1, None, 0)]).unwrap();

    let (status, body) = app
        .request_json(
            "POST",
            "/api/watchlist/import",
            json!([
                {"id": 1, "title": "dup"},
                {"id": 2, "title": "fresh", "total_chapters": 5},
                {"title": "no id"},
            ]),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imported"], 1);
    assert_eq!(body["skipped"], 2);

    let (_, body) = app.request("GET", "/api/watchlist").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

// =============================================================================
// Manual refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_runs_a_pass_and_reports_checked() {
    let app = TestApp::new();
    app.state
        .watchlist
        .save(&[tracked(270, Some(699), 699)])
        .unwrap();
    app.upstream
        .script(270, Scripted::Found(record(270, "Berserk", Some(700))));

    let (status, body) = app.request("POST", "/api/watchlist/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checked"], 1);

    // The pass dispatched and recorded like a scheduled one
    assert_eq!(app.pushover.sent().len(), 1);
    let (_, body) = app.request("GET", "/api/notifications").await;
    assert_eq!(body["data"][0]["kind"], "chapter_update");
}

#[tokio::test]
async fn test_refresh_succeeds_even_when_every_item_fails() {
    let app = TestApp::new();
    app.state.watchlist.save(&[tracked(7, Some(1), 0)]).unwrap();
    app.upstream.script(7, Scripted::NotFound);

    let (status, body) = app.request("POST", "/api/watchlist/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checked"], 1);
}

// =============================================================================
// Search and series lookup
// =============================================================================

#[tokio::test]
async fn test_search_filters_normalized_results() {
    let app = TestApp::new();
    let mut releasing = record(1, "one", Some(10));
    releasing.status = Some("releasing".to_string());
    releasing.has_anime = Some(true);
    let mut finished = record(2, "two", Some(20));
    finished.status = Some("finished".to_string());
    finished.has_anime = Some(false);
    app.upstream.set_search_results(vec![releasing, finished]);

    let (status, body) = app
        .request("GET", "/api/search?q=berserk&status=releasing")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["id"], 1);

    let (_, body) = app.request("GET", "/api/search?q=berserk&has_anime=false").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["id"], 2);
}

#[tokio::test]
async fn test_search_requires_query() {
    let app = TestApp::new();
    let (status, _) = app.request("GET", "/api/search?q=%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_series_lookup_found_and_missing() {
    let app = TestApp::new();
    app.upstream
        .script(270, Scripted::Found(record(270, "Berserk", Some(700))));

    let (status, body) = app.request("GET", "/api/series/270").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Berserk");

    let (status, _) = app.request("GET", "/api/series/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_series_lookup_follows_merge() {
    let app = TestApp::new();
    app.upstream.script(1, Scripted::Redirected(555));
    app.upstream
        .script(555, Scripted::Found(record(555, "merged", Some(10))));

    let (status, body) = app.request("GET", "/api/series/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["merged_with"], 555);
    assert_eq!(body["data"]["id"], 555);
}

// =============================================================================
// Notification history and manual test
// =============================================================================

#[tokio::test]
async fn test_notifications_listing_and_clear() {
    let app = TestApp::new();
    app.state
        .watchlist
        .save(&[tracked(270, Some(1), 0)])
        .unwrap();
    app.upstream
        .script(270, Scripted::Found(record(270, "Berserk", Some(2))));
    app.request("POST", "/api/watchlist/refresh").await;

    let (_, body) = app.request("GET", "/api/notifications").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    let id = body["data"][0]["id"].as_u64().unwrap();

    let (_, body) = app
        .request("DELETE", &format!("/api/notifications/{id}"))
        .await;
    assert_eq!(body["removed"], 1);

    // Another update, then clear the whole history
    app.upstream
        .rescript(270, Scripted::Found(record(270, "Berserk", Some(3))));
    app.request("POST", "/api/watchlist/refresh").await;
    let (_, body) = app.request("DELETE", "/api/notifications").await;
    assert_eq!(body["removed"], 1);

    let (_, body) = app.request("GET", "/api/notifications").await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_notify_debug_reports_channel_configuration() {
    let app = TestApp::new();
    let (status, body) = app.request("GET", "/api/notify/debug").await;
    assert_eq!(status, StatusCode::OK);
    let channels = body["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 2);
    assert!(channels.iter().all(|c| c["configured"] == true));
}

#[tokio::test]
async fn test_notify_test_delivers_and_records() {
    let app = TestApp::new();
    let (status, body) = app.request("POST", "/api/notify/test").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["channels"]["pushover"], true);
    assert_eq!(app.pushover.sent().len(), 1);
    assert_eq!(app.discord.sent().len(), 1);

    let (_, body) = app.request("GET", "/api/notifications").await;
    assert_eq!(body["data"][0]["kind"], "test");
}

#[tokio::test]
async fn test_notify_test_reports_total_failure_as_bad_gateway() {
    let app = TestApp::new();

    // Rebuild the app with unconfigured channels
    let settings = (*app.state.settings).clone();
    let state = AppState::new(
        settings,
        Arc::clone(&app.upstream) as Arc<dyn UpstreamClient>,
        vec![
            MockChannel::unconfigured("pushover") as Arc<dyn NotificationChannel>,
            MockChannel::unconfigured("discord") as Arc<dyn NotificationChannel>,
        ],
    );
    let router = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/notify/test")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
