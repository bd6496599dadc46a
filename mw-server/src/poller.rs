//! Background polling loop
//!
//! Wraps the reconciliation engine in a cancellable periodic loop. Pass
//! failures are recorded and never terminate the loop; cancellation is
//! cooperative and observed at the sleep boundary, so an in-flight pass
//! always finishes before the task exits.

use crate::engine::Reconciler;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Effective sleep never drops below this, whatever the jitter says
const MIN_SLEEP: Duration = Duration::from_secs(1);

/// Jitter bound as a fraction of the interval (±10%)
const JITTER_FRACTION: f64 = 0.1;

/// Most recent pass failure, kept for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PassError {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Observable poller state, shared with the HTTP layer
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollerStatus {
    pub passes_completed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pass_at: Option<DateTime<Utc>>,
    /// Items examined by the most recent successful pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_items: Option<usize>,
    /// Latest pass failure; kept until overwritten by a newer failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<PassError>,
}

/// Draw the next sleep: `interval` plus uniform jitter in ±10%, floored so
/// a tiny interval can never spin the loop.
pub fn jittered_sleep(interval: Duration) -> Duration {
    let max_jitter = interval.as_secs_f64() * JITTER_FRACTION;
    let jitter = if max_jitter > 0.0 {
        rand::thread_rng().gen_range(-max_jitter..=max_jitter)
    } else {
        0.0
    };
    let secs = (interval.as_secs_f64() + jitter).max(MIN_SLEEP.as_secs_f64());
    Duration::from_secs_f64(secs)
}

/// Run the periodic polling loop until cancelled.
///
/// `interval_sec <= 0` disables polling entirely; the task logs and exits,
/// which is a valid configuration (manual refresh still works).
pub async fn poll_loop(
    engine: Arc<Reconciler>,
    interval_sec: i64,
    status: Arc<RwLock<PollerStatus>>,
    cancel: CancellationToken,
) {
    if interval_sec <= 0 {
        info!(interval_sec, "background poller disabled");
        return;
    }
    let interval = Duration::from_secs(interval_sec as u64);
    info!(interval_sec, "background poller started");

    loop {
        match engine.run_pass().await {
            Ok(summary) => {
                let mut s = status.write().await;
                s.passes_completed += 1;
                s.last_pass_at = Some(mw_common::time::now());
                s.last_checked_items = Some(summary.checked);
            }
            Err(err) => {
                error!(error = %err, "watchlist pass failed");
                let mut s = status.write().await;
                s.last_error = Some(PassError {
                    at: mw_common::time::now(),
                    message: err.to_string(),
                });
            }
        }

        let sleep_for = jittered_sleep(interval);
        debug!(sleep_secs = sleep_for.as_secs(), "poller sleeping");
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("background poller stopped");
                return;
            }
            _ = tokio::time::sleep(sleep_for) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let interval = Duration::from_secs(1800);
        for _ in 0..200 {
            let sleep = jittered_sleep(interval).as_secs_f64();
            assert!(sleep >= 1620.0, "sleep {sleep} below -10%");
            assert!(sleep <= 1980.0, "sleep {sleep} above +10%");
        }
    }

    #[test]
    fn test_jitter_floors_at_one_second() {
        // A 1s interval can jitter below the floor; it must be clamped
        for _ in 0..50 {
            assert!(jittered_sleep(Duration::from_secs(1)) >= MIN_SLEEP);
        }
        assert!(jittered_sleep(Duration::ZERO) >= MIN_SLEEP);
    }

    #[test]
    fn test_jitter_varies() {
        let interval = Duration::from_secs(1800);
        let first = jittered_sleep(interval);
        // 200 draws from a 360 s window collapsing to one value means the
        // RNG is not being consulted
        let all_same = (0..200).all(|_| jittered_sleep(interval) == first);
        assert!(!all_same);
    }
}
