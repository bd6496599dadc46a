//! Notification policy
//!
//! A pure decision function so the gating rules can be tested without any
//! I/O and audited in one place. The engine records the decision on every
//! detected update, whether or not anything was actually dispatched.

use crate::models::{NotificationPreferences, SeriesStatus};

/// Decide whether a detected update for a series should be dispatched.
///
/// - `enabled = false` always suppresses.
/// - `only_when_reading = true` restricts dispatch to series the user is
///   actively consuming (reading or releasing).
pub fn should_notify(prefs: &NotificationPreferences, status: SeriesStatus) -> bool {
    if !prefs.enabled {
        return false;
    }
    if prefs.only_when_reading {
        return status.is_active();
    }
    true
}
