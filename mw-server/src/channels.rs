//! Outbound notification channels
//!
//! Each channel is a uniform capability: `send(title, message)` returning a
//! [`DeliveryOutcome`]. Ordinary delivery failure (network error, missing
//! credentials, upstream rejection) is reported as `delivered: false` with a
//! diagnostic, never as an error, so the engine's dispatch loop stays
//! branch-free over failure modes.

use async_trait::async_trait;
use mw_common::Settings;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-send timeout applied by the dispatch helpers
pub const CHANNEL_TIMEOUT: Duration = Duration::from_secs(15);

/// Pushover message endpoint
const PUSHOVER_ENDPOINT: &str = "https://api.pushover.net/1/messages.json";

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl DeliveryOutcome {
    pub fn ok() -> Self {
        Self {
            delivered: true,
            diagnostic: None,
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            delivered: false,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// One outbound notification mechanism
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable channel name; also the key used in notification preferences
    /// and history records.
    fn name(&self) -> &'static str;

    /// Whether the channel has the credentials it needs to deliver.
    fn configured(&self) -> bool;

    /// Attempt one delivery. Must not error for ordinary failures.
    async fn send(&self, title: &str, message: &str) -> DeliveryOutcome;
}

/// Build the channel set from configuration.
///
/// Channels are always present; missing credentials make a channel
/// unconfigured, and its sends report `delivered: false`.
pub fn build_channels(settings: &Settings) -> Vec<Arc<dyn NotificationChannel>> {
    vec![
        Arc::new(PushoverChannel::new(
            settings.pushover_app_token.clone(),
            settings.pushover_user_key.clone(),
        )),
        Arc::new(DiscordChannel::new(settings.discord_webhook_url.clone())),
    ]
}

/// Send `title`/`message` on every configured channel, independently.
///
/// Returns a name → delivered map covering every channel in the set;
/// unconfigured channels are included as `false` without an attempt.
/// Used by the manual test trigger, which ignores per-series preferences.
pub async fn broadcast(
    channels: &[Arc<dyn NotificationChannel>],
    title: &str,
    message: &str,
) -> BTreeMap<String, bool> {
    let mut outcomes = BTreeMap::new();
    for channel in channels {
        let delivered = if channel.configured() {
            send_bounded(channel.as_ref(), title, message).await
        } else {
            false
        };
        outcomes.insert(channel.name().to_string(), delivered);
    }
    outcomes
}

/// One send with the channel timeout applied; failures are logged and
/// reported as `false`.
pub async fn send_bounded(channel: &dyn NotificationChannel, title: &str, message: &str) -> bool {
    match tokio::time::timeout(CHANNEL_TIMEOUT, channel.send(title, message)).await {
        Ok(outcome) => {
            if !outcome.delivered {
                warn!(
                    channel = channel.name(),
                    diagnostic = outcome.diagnostic.as_deref().unwrap_or("unknown"),
                    "notification delivery failed"
                );
            }
            outcome.delivered
        }
        Err(_) => {
            warn!(channel = channel.name(), "notification delivery timed out");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Pushover
// ---------------------------------------------------------------------------

/// Pushover push notification channel
pub struct PushoverChannel {
    http: reqwest::Client,
    endpoint: String,
    app_token: Option<String>,
    user_key: Option<String>,
}

impl PushoverChannel {
    pub fn new(app_token: Option<String>, user_key: Option<String>) -> Self {
        Self::with_endpoint(PUSHOVER_ENDPOINT, app_token, user_key)
    }

    /// Endpoint-injectable constructor for tests.
    pub fn with_endpoint(
        endpoint: &str,
        app_token: Option<String>,
        user_key: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(CHANNEL_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            endpoint: endpoint.to_string(),
            app_token,
            user_key,
        }
    }
}

#[async_trait]
impl NotificationChannel for PushoverChannel {
    fn name(&self) -> &'static str {
        "pushover"
    }

    fn configured(&self) -> bool {
        self.app_token.is_some() && self.user_key.is_some()
    }

    async fn send(&self, title: &str, message: &str) -> DeliveryOutcome {
        let (Some(token), Some(user)) = (&self.app_token, &self.user_key) else {
            return DeliveryOutcome::failed("Pushover credentials not configured");
        };

        let response = self
            .http
            .post(&self.endpoint)
            .form(&[
                ("token", token.as_str()),
                ("user", user.as_str()),
                ("title", title),
                ("message", message),
            ])
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                // Pushover reports acceptance in the body as status == 1
                let body = resp.json::<serde_json::Value>().await.unwrap_or(json!({}));
                let accepted =
                    status.is_success() && body.get("status").and_then(|v| v.as_i64()) == Some(1);
                if accepted {
                    debug!("pushover notification accepted");
                    DeliveryOutcome::ok()
                } else {
                    DeliveryOutcome::failed(format!("pushover returned {status}: {body}"))
                }
            }
            Err(err) => DeliveryOutcome::failed(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Discord
// ---------------------------------------------------------------------------

/// Discord blurple, used for embed accents
const DISCORD_EMBED_COLOR: u32 = 0x5865F2;

/// Discord webhook channel
pub struct DiscordChannel {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl DiscordChannel {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(CHANNEL_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            webhook_url,
        }
    }
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn send(&self, title: &str, message: &str) -> DeliveryOutcome {
        let Some(url) = &self.webhook_url else {
            return DeliveryOutcome::failed("Discord webhook not configured");
        };

        let payload = json!({
            "embeds": [{
                "title": title,
                "description": message,
                "color": DISCORD_EMBED_COLOR,
            }]
        });

        match self.http.post(url).json(&payload).send().await {
            Ok(resp) => {
                let status = resp.status();
                // Webhooks answer 204 No Content; 200 appears with ?wait=true
                if status == reqwest::StatusCode::NO_CONTENT || status == reqwest::StatusCode::OK {
                    debug!("discord notification accepted");
                    DeliveryOutcome::ok()
                } else {
                    DeliveryOutcome::failed(format!("discord returned {status}"))
                }
            }
            Err(err) => DeliveryOutcome::failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_pushover_reports_failure_without_io() {
        let channel = PushoverChannel::new(None, None);
        assert!(!channel.configured());

        let outcome = channel.send("t", "m").await;
        assert!(!outcome.delivered);
        assert!(outcome.diagnostic.unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_unconfigured_discord_reports_failure_without_io() {
        let channel = DiscordChannel::new(None);
        assert!(!channel.configured());

        let outcome = channel.send("t", "m").await;
        assert!(!outcome.delivered);
    }

    #[tokio::test]
    async fn test_broadcast_skips_unconfigured_channels() {
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(PushoverChannel::new(None, None)),
            Arc::new(DiscordChannel::new(None)),
        ];

        let outcomes = broadcast(&channels, "t", "m").await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes.get("pushover"), Some(&false));
        assert_eq!(outcomes.get("discord"), Some(&false));
    }

    #[test]
    fn test_outcome_constructors() {
        assert!(DeliveryOutcome::ok().delivered);
        let failed = DeliveryOutcome::failed("nope");
        assert!(!failed.delivered);
        assert_eq!(failed.diagnostic.as_deref(), Some("nope"));
    }
}
