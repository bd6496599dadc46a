//! Watchlist reconciliation engine
//!
//! One pass walks the watchlist in stored order and, for each series:
//! fetches the authoritative upstream record (with bounded retry), follows
//! at most one merge redirect, diffs the chapter count against stored state,
//! evaluates notification policy, dispatches to the enabled channels, and
//! records a history entry for every detected update. The whole watchlist
//! is then persisted once as a batch.
//!
//! Failure isolation is the load-bearing property here: a series that
//! cannot be fetched is skipped with its stored state untouched, and never
//! aborts the pass for the rest of the list. Only a store write failure is
//! fatal to a pass.

use crate::channels::{send_bounded, NotificationChannel};
use crate::models::{NotificationRecord, TrackedItem};
use crate::policy;
use crate::storage::{HistoryStore, WatchlistStore};
use crate::upstream::{FetchOutcome, SeriesRecord, UpstreamClient, UpstreamError};
use mw_common::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Total fetch attempts per series per pass (1 initial + 2 retries)
const FETCH_ATTEMPTS: u32 = 3;

/// Retry delay grows linearly: attempt × this step
const RETRY_DELAY_STEP: Duration = Duration::from_millis(500);

/// Title used for chapter-update pushes
const UPDATE_PUSH_TITLE: &str = "New chapter(s)";

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PassSummary {
    /// Items examined, including ones skipped on upstream failure
    pub checked: usize,
}

/// The reconciliation engine. Scheduled and manual passes share one
/// instance, and the internal lock serializes them.
pub struct Reconciler {
    upstream: Arc<dyn UpstreamClient>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    watchlist: WatchlistStore,
    history: HistoryStore,
    /// Serializes passes; held for the full load-check-save cycle so two
    /// concurrent triggers cannot interleave their batch writes
    pass_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        upstream: Arc<dyn UpstreamClient>,
        channels: Vec<Arc<dyn NotificationChannel>>,
        watchlist: WatchlistStore,
        history: HistoryStore,
    ) -> Self {
        Self {
            upstream,
            channels,
            watchlist,
            history,
            pass_lock: Mutex::new(()),
        }
    }

    /// Run one full pass over the watchlist.
    ///
    /// Per-item upstream failures degrade that item only; an error return
    /// means the pass itself failed (store write), in which case the
    /// in-memory updates of this pass are lost.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let _guard = self.pass_lock.lock().await;

        let mut items = self.watchlist.load();
        info!(items = items.len(), "starting watchlist pass");

        for item in items.iter_mut() {
            self.check_item(item).await?;
        }

        self.watchlist.save(&items)?;
        debug!(checked = items.len(), "watchlist pass complete");
        Ok(PassSummary {
            checked: items.len(),
        })
    }

    /// Reconcile a single item against upstream.
    ///
    /// Returns `Ok` for everything except history-store write failures;
    /// skips (fetch failure, not-found, dead merge target) leave the item
    /// exactly as loaded.
    async fn check_item(&self, item: &mut TrackedItem) -> Result<()> {
        let original_id = item.id;

        let outcome = match self.fetch_with_retry(original_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(series_id = original_id, error = %err, "upstream fetch failed, skipping");
                return Ok(());
            }
        };

        let (sid, record) = match outcome {
            FetchOutcome::Found(record) => (original_id, record),
            FetchOutcome::NotFound => {
                warn!(series_id = original_id, "series not found upstream, skipping");
                return Ok(());
            }
            FetchOutcome::Redirected(target) => {
                // One follow-up fetch, no retries. Any failure here
                // discards the redirect; the old id stays on disk and the
                // next pass tries again from it.
                debug!(series_id = original_id, target, "following merge redirect");
                match self.upstream.fetch(target, true).await {
                    Ok(FetchOutcome::Found(record)) => (target, record),
                    Ok(FetchOutcome::NotFound) => {
                        warn!(series_id = original_id, target, "merge target missing, skipping");
                        return Ok(());
                    }
                    Ok(FetchOutcome::Redirected(next)) => {
                        warn!(
                            series_id = original_id,
                            target, next, "chained merge redirect, skipping"
                        );
                        return Ok(());
                    }
                    Err(err) => {
                        warn!(
                            series_id = original_id,
                            target, error = %err, "merge target fetch failed, skipping"
                        );
                        return Ok(());
                    }
                }
            }
        };
        item.id = sid;

        let old_total = item.total_chapters;
        let new_total = record.total_chapters;
        let decision = policy::should_notify(&item.notifications, item.status);

        if let (Some(old), Some(new)) = (old_total, new_total) {
            if new > old {
                self.record_update(item, sid, old, new, decision).await?;
            }
        }

        apply_record(item, sid, record);
        Ok(())
    }

    /// Dispatch (policy permitting) and record one detected chapter update.
    async fn record_update(
        &self,
        item: &TrackedItem,
        sid: u64,
        old: u64,
        new: u64,
        decision: bool,
    ) -> Result<()> {
        // last_read as of before this pass touched anything
        let unread = new.saturating_sub(item.last_read);
        let title = if item.title.is_empty() {
            "(unknown)"
        } else {
            item.title.as_str()
        };
        let mut message = format!("{title} now has {new} chapters.");
        if unread > 0 {
            message.push_str(&format!(" You're {unread} behind."));
        }

        let outcomes = if decision {
            self.dispatch(item, &message).await
        } else {
            debug!(series_id = sid, "notification suppressed by policy");
            self.silent_outcomes()
        };

        info!(
            series_id = sid,
            old_total = old,
            new_total = new,
            unread,
            notifications_enabled = decision,
            "chapter update detected"
        );

        self.history.append(NotificationRecord::chapter_update(
            sid, title, old, new, unread, &message, outcomes, decision,
        ))?;
        Ok(())
    }

    /// Send to each channel the item's preferences enable, independently.
    /// One channel failing never stops the others.
    async fn dispatch(&self, item: &TrackedItem, message: &str) -> BTreeMap<String, bool> {
        let mut outcomes = BTreeMap::new();
        for channel in &self.channels {
            let delivered = if item.notifications.channel_enabled(channel.name()) {
                send_bounded(channel.as_ref(), UPDATE_PUSH_TITLE, message).await
            } else {
                false
            };
            outcomes.insert(channel.name().to_string(), delivered);
        }
        outcomes
    }

    /// Outcome map for a suppressed dispatch: every channel false.
    fn silent_outcomes(&self) -> BTreeMap<String, bool> {
        self.channels
            .iter()
            .map(|c| (c.name().to_string(), false))
            .collect()
    }

    /// Fetch with bounded retry: transient failures sleep `attempt × 500 ms`
    /// and retry up to 3 attempts total; anything else fails immediately.
    async fn fetch_with_retry(&self, id: u64) -> std::result::Result<FetchOutcome, UpstreamError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.upstream.fetch(id, true).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    if !err.is_transient() || attempt >= FETCH_ATTEMPTS {
                        return Err(err);
                    }
                    let delay = RETRY_DELAY_STEP * attempt;
                    debug!(
                        series_id = id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Refresh an item's opportunistic fields from a fetched record.
///
/// Runs on every successful fetch, update or not. The stored chapter count
/// never moves backward: upstream occasionally reports a smaller count
/// during re-indexing, and that is treated as unknown data, not regression.
fn apply_record(item: &mut TrackedItem, sid: u64, record: SeriesRecord) {
    if let Some(title) = record.title {
        item.title = title;
    }
    match (item.total_chapters, record.total_chapters) {
        (Some(old), Some(new)) if new < old => {
            warn!(
                series_id = sid,
                stored = old,
                reported = new,
                "upstream reported fewer chapters, keeping stored count"
            );
        }
        (_, Some(new)) => item.total_chapters = Some(new),
        (_, None) => {}
    }
    if record.cover.is_some() {
        item.cover = record.cover;
    }
    item.last_chapter_at = record.last_updated_at;
    item.last_checked = mw_common::time::now();
}
