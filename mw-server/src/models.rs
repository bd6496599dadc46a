//! Core data model: tracked series and notification history records
//!
//! Wire names match the persisted JSON files (`watchlist.json`,
//! `notifications.json`), so the structs double as the storage schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reading status of a tracked series.
///
/// `Reading` and `Releasing` form the "actively consumed" set used by the
/// notification policy; the remaining values suppress notifications when
/// `only_when_reading` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesStatus {
    Reading,
    Releasing,
    ToRead,
    OnHold,
    Finished,
    Dropped,
}

impl SeriesStatus {
    /// Whether the user is actively consuming the series.
    pub fn is_active(self) -> bool {
        matches!(self, SeriesStatus::Reading | SeriesStatus::Releasing)
    }
}

impl Default for SeriesStatus {
    fn default() -> Self {
        SeriesStatus::Reading
    }
}

/// Per-series notification preferences. Everything defaults to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    /// Master switch for this series
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Deliver via Pushover
    #[serde(default = "default_true")]
    pub pushover: bool,
    /// Deliver via Discord webhook
    #[serde(default = "default_true")]
    pub discord: bool,
    /// Only notify while status is reading/releasing
    #[serde(default = "default_true")]
    pub only_when_reading: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            pushover: true,
            discord: true,
            only_when_reading: true,
        }
    }
}

impl NotificationPreferences {
    /// Whether the named channel is enabled for this series.
    ///
    /// Unknown channel names are disabled, so adding a channel to the
    /// service never implicitly opts existing items into it until the
    /// preference schema learns about it.
    pub fn channel_enabled(&self, name: &str) -> bool {
        match name {
            "pushover" => self.pushover,
            "discord" => self.discord,
            _ => false,
        }
    }
}

/// One monitored series in the watchlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedItem {
    /// Upstream series id; rewritten by the engine when the series is merged
    pub id: u64,
    #[serde(default)]
    pub title: String,
    /// Largest chapter count observed upstream; never regresses
    #[serde(default)]
    pub total_chapters: Option<u64>,
    /// Chapters the user has read; owned by the progress API, not the engine
    #[serde(default)]
    pub last_read: u64,
    #[serde(default)]
    pub status: SeriesStatus,
    #[serde(default)]
    pub notifications: NotificationPreferences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default = "mw_common::time::now")]
    pub added_at: DateTime<Utc>,
    /// Upstream's last-update timestamp, kept as an opaque string
    #[serde(default)]
    pub last_chapter_at: Option<String>,
    #[serde(default = "mw_common::time::now")]
    pub last_checked: DateTime<Utc>,
}

impl TrackedItem {
    /// Chapters released but not yet read. Derived, never stored.
    pub fn unread(&self) -> u64 {
        self.total_chapters
            .unwrap_or(0)
            .saturating_sub(self.last_read)
    }
}

/// Kind of a notification history record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ChapterUpdate,
    Test,
}

/// One entry of the append-only notification history.
///
/// `id` and `detected_at` are assigned by the history store at append time;
/// the constructors below leave `id` at 0 as a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: u64,
    pub kind: NotificationKind,
    pub detected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Per-channel delivery outcome; false when suppressed or not attempted
    #[serde(default)]
    pub channels: BTreeMap<String, bool>,
    /// The policy decision at detection time, recorded even when dispatch
    /// was suppressed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
}

impl NotificationRecord {
    /// Build a chapter-update record for a detected progress event.
    #[allow(clippy::too_many_arguments)]
    pub fn chapter_update(
        series_id: u64,
        title: &str,
        old_total: u64,
        new_total: u64,
        unread: u64,
        message: &str,
        channels: BTreeMap<String, bool>,
        notifications_enabled: bool,
    ) -> Self {
        Self {
            id: 0,
            kind: NotificationKind::ChapterUpdate,
            detected_at: mw_common::time::now(),
            series_id: Some(series_id),
            title: Some(title.to_string()),
            old_total: Some(old_total),
            new_total: Some(new_total),
            unread: Some(unread),
            message: Some(message.to_string()),
            channels,
            notifications_enabled: Some(notifications_enabled),
        }
    }

    /// Build a record for a manually triggered test notification.
    pub fn test(title: &str, message: &str, channels: BTreeMap<String, bool>) -> Self {
        Self {
            id: 0,
            kind: NotificationKind::Test,
            detected_at: mw_common::time::now(),
            series_id: None,
            title: Some(title.to_string()),
            old_total: None,
            new_total: None,
            unread: None,
            message: Some(message.to_string()),
            channels,
            notifications_enabled: None,
        }
    }
}

// ---------------------------------------------------------------------------
// API request payloads
// ---------------------------------------------------------------------------

/// POST /api/watchlist body
#[derive(Debug, Deserialize)]
pub struct WatchlistAdd {
    pub id: u64,
    pub title: Option<String>,
    pub total_chapters: Option<u64>,
    pub last_read: Option<u64>,
    pub status: Option<SeriesStatus>,
    pub notifications: Option<NotificationPreferences>,
}

/// PATCH /api/watchlist/{id}/progress body; exactly one action is applied,
/// in the order mark_latest > decrement > last_read
#[derive(Debug, Default, Deserialize)]
pub struct ProgressPatch {
    pub mark_latest: Option<bool>,
    pub last_read: Option<u64>,
    pub decrement: Option<u64>,
}

/// PATCH /api/watchlist/{id}/status body
#[derive(Debug, Deserialize)]
pub struct StatusPatch {
    pub status: SeriesStatus,
}

/// PATCH /api/watchlist/{id}/notifications body; only present fields change
#[derive(Debug, Default, Deserialize)]
pub struct PreferencesPatch {
    pub enabled: Option<bool>,
    pub pushover: Option<bool>,
    pub discord: Option<bool>,
    pub only_when_reading: Option<bool>,
}

impl PreferencesPatch {
    /// Apply the present fields onto existing preferences.
    pub fn apply(&self, prefs: &mut NotificationPreferences) {
        if let Some(v) = self.enabled {
            prefs.enabled = v;
        }
        if let Some(v) = self.pushover {
            prefs.pushover = v;
        }
        if let Some(v) = self.discord {
            prefs.discord = v;
        }
        if let Some(v) = self.only_when_reading {
            prefs.only_when_reading = v;
        }
    }
}
