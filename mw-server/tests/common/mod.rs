//! Shared fixtures: a scripted upstream, recording channels, and a
//! ready-wired engine over temp-dir stores.

use async_trait::async_trait;
use mw_server::channels::{DeliveryOutcome, NotificationChannel};
use mw_server::engine::Reconciler;
use mw_server::models::{NotificationPreferences, SeriesStatus, TrackedItem};
use mw_server::storage::{HistoryStore, WatchlistStore};
use mw_server::upstream::{FetchOutcome, SeriesRecord, UpstreamClient, UpstreamError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// One scripted response for a series id
#[derive(Debug, Clone)]
pub enum Scripted {
    Found(SeriesRecord),
    NotFound,
    Redirected(u64),
    Transient,
}

/// Scripted upstream: responses are consumed per id in order, and the last
/// one sticks, so a steady upstream state is just a single entry.
#[derive(Default)]
pub struct ScriptedUpstream {
    scripts: Mutex<HashMap<u64, VecDeque<Scripted>>>,
    search_results: Mutex<Vec<SeriesRecord>>,
    calls: Mutex<Vec<u64>>,
}

impl ScriptedUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a response for `id`. Multiple pushes play back in order.
    pub fn script(&self, id: u64, response: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .push_back(response);
    }

    /// Drop whatever is queued for `id` and start a fresh script.
    pub fn rescript(&self, id: u64, response: Scripted) {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.entry(id).or_default();
        queue.clear();
        queue.push_back(response);
    }

    pub fn set_search_results(&self, results: Vec<SeriesRecord>) {
        *self.search_results.lock().unwrap() = results;
    }

    /// Ids fetched so far, in call order (retries included).
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, id: u64) -> usize {
        self.calls.lock().unwrap().iter().filter(|&&c| c == id).count()
    }
}

#[async_trait]
impl UpstreamClient for ScriptedUpstream {
    async fn fetch(&self, id: u64, _full: bool) -> Result<FetchOutcome, UpstreamError> {
        self.calls.lock().unwrap().push(id);

        let response = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&id) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match response {
            Some(Scripted::Found(record)) => Ok(FetchOutcome::Found(record)),
            Some(Scripted::NotFound) | None => Ok(FetchOutcome::NotFound),
            Some(Scripted::Redirected(target)) => Ok(FetchOutcome::Redirected(target)),
            Some(Scripted::Transient) => {
                Err(UpstreamError::Transient("scripted failure".to_string()))
            }
        }
    }

    async fn search(
        &self,
        _q: &str,
        _page: u32,
        _limit: u32,
    ) -> Result<Vec<SeriesRecord>, UpstreamError> {
        Ok(self.search_results.lock().unwrap().clone())
    }
}

/// Recording channel with a fixed delivery result
pub struct MockChannel {
    name: &'static str,
    configured: bool,
    deliver: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl MockChannel {
    pub fn new(name: &'static str, deliver: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            configured: true,
            deliver,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn unconfigured(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            configured: false,
            deliver: false,
            sent: Mutex::new(Vec::new()),
        })
    }

    /// (title, message) pairs attempted on this channel.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, title: &str, message: &str) -> DeliveryOutcome {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        if self.deliver {
            DeliveryOutcome::ok()
        } else {
            DeliveryOutcome::failed("mock delivery failure")
        }
    }
}

/// A normalized upstream record with just the fields a test cares about
pub fn record(id: u64, title: &str, total_chapters: Option<u64>) -> SeriesRecord {
    SeriesRecord {
        id: Some(id),
        title: Some(title.to_string()),
        total_chapters,
        ..SeriesRecord::default()
    }
}

/// A tracked item with sensible defaults for tests
pub fn tracked(id: u64, total_chapters: Option<u64>, last_read: u64) -> TrackedItem {
    TrackedItem {
        id,
        title: format!("series {id}"),
        total_chapters,
        last_read,
        status: SeriesStatus::Reading,
        notifications: NotificationPreferences::default(),
        cover: None,
        added_at: mw_common::time::now(),
        last_chapter_at: None,
        last_checked: mw_common::time::now(),
    }
}

/// Engine plus everything needed to observe it
pub struct Harness {
    pub _dir: TempDir,
    pub upstream: Arc<ScriptedUpstream>,
    pub pushover: Arc<MockChannel>,
    pub discord: Arc<MockChannel>,
    pub watchlist: WatchlistStore,
    pub history: HistoryStore,
    pub engine: Reconciler,
}

impl Harness {
    pub fn new(items: Vec<TrackedItem>) -> Self {
        let dir = TempDir::new().unwrap();
        let watchlist = WatchlistStore::new(dir.path().join("watchlist.json"));
        let history = HistoryStore::new(dir.path().join("notifications.json"));
        watchlist.save(&items).unwrap();

        let upstream = ScriptedUpstream::new();
        let pushover = MockChannel::new("pushover", true);
        let discord = MockChannel::new("discord", true);

        let engine = Reconciler::new(
            Arc::clone(&upstream) as Arc<dyn UpstreamClient>,
            vec![
                Arc::clone(&pushover) as Arc<dyn NotificationChannel>,
                Arc::clone(&discord) as Arc<dyn NotificationChannel>,
            ],
            watchlist.clone(),
            history.clone(),
        );

        Self {
            _dir: dir,
            upstream,
            pushover,
            discord,
            watchlist,
            history,
            engine,
        }
    }
}
