//! Configuration loading
//!
//! Settings resolve per field in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`MANGAWATCH_*`)
//! 3. TOML config file (`~/.config/mangawatch/config.toml` by default)
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default upstream series API base URL
pub const DEFAULT_UPSTREAM_BASE: &str = "https://api.mangabaka.dev";

/// Default background poll interval in seconds (30 minutes)
pub const DEFAULT_POLL_INTERVAL_SEC: i64 = 1800;

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 8999;

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding watchlist.json and notifications.json
    pub data_dir: PathBuf,
    /// HTTP listen port
    pub port: u16,
    /// Upstream series API base URL (no trailing slash)
    pub upstream_base: String,
    /// Background poll interval in seconds; <= 0 disables polling
    pub poll_interval_sec: i64,
    /// Pushover application token (channel unconfigured when absent)
    pub pushover_app_token: Option<String>,
    /// Pushover user key
    pub pushover_user_key: Option<String>,
    /// Discord webhook URL (channel unconfigured when absent)
    pub discord_webhook_url: Option<String>,
}

impl Settings {
    /// Path of the persisted watchlist
    pub fn watchlist_path(&self) -> PathBuf {
        self.data_dir.join("watchlist.json")
    }

    /// Path of the persisted notification history
    pub fn notifications_path(&self) -> PathBuf {
        self.data_dir.join("notifications.json")
    }

    /// Validate invariants that would otherwise surface as confusing
    /// runtime failures.
    pub fn validate(&self) -> Result<()> {
        if !self.upstream_base.starts_with("https://") && !self.upstream_base.starts_with("http://")
        {
            return Err(Error::Config(
                "upstream base URL must start with http:// or https://".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optional per-field overrides, typically parsed from the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Alternative TOML config file path
    pub config_file: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub port: Option<u16>,
    pub poll_interval_sec: Option<i64>,
}

/// On-disk TOML configuration (all fields optional)
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub data_dir: Option<PathBuf>,
    pub port: Option<u16>,
    pub upstream_base: Option<String>,
    pub poll_interval_sec: Option<i64>,
    pub pushover_app_token: Option<String>,
    pub pushover_user_key: Option<String>,
    pub discord_webhook_url: Option<String>,
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mangawatch").join("config.toml"))
}

/// Load and resolve settings from all configuration tiers.
pub fn load_settings(overrides: &Overrides) -> Result<Settings> {
    let file = load_toml_config(overrides.config_file.as_deref())?;

    let data_dir = overrides
        .data_dir
        .clone()
        .or_else(|| env_var("MANGAWATCH_DATA_DIR").map(PathBuf::from))
        .or_else(|| file.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from("./data"));

    let port = match overrides.port {
        Some(p) => p,
        None => match env_var("MANGAWATCH_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("MANGAWATCH_PORT is not a valid port: {raw}")))?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        },
    };

    let upstream_base = env_var("MANGAWATCH_UPSTREAM_BASE")
        .or_else(|| file.upstream_base.clone())
        .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE.to_string())
        .trim_end_matches('/')
        .to_string();

    let poll_interval_sec = match overrides.poll_interval_sec {
        Some(v) => v,
        None => match env_var("MANGAWATCH_POLL_INTERVAL_SEC") {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                Error::Config(format!(
                    "MANGAWATCH_POLL_INTERVAL_SEC is not a valid integer: {raw}"
                ))
            })?,
            None => file.poll_interval_sec.unwrap_or(DEFAULT_POLL_INTERVAL_SEC),
        },
    };

    let settings = Settings {
        data_dir,
        port,
        upstream_base,
        poll_interval_sec,
        pushover_app_token: env_var("MANGAWATCH_PUSHOVER_APP_TOKEN")
            .or_else(|| file.pushover_app_token.clone()),
        pushover_user_key: env_var("MANGAWATCH_PUSHOVER_USER_KEY")
            .or_else(|| file.pushover_user_key.clone()),
        discord_webhook_url: env_var("MANGAWATCH_DISCORD_WEBHOOK_URL")
            .or_else(|| file.discord_webhook_url.clone()),
    };

    settings.validate()?;
    Ok(settings)
}

/// Read the TOML config file, if one exists.
///
/// An explicitly requested file that cannot be read or parsed is an error;
/// a missing default file is not.
fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let (path, explicit) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => return Ok(TomlConfig::default()),
        },
    };

    if !path.exists() {
        if explicit {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    match toml::from_str(&content) {
        Ok(config) => Ok(config),
        Err(e) if explicit => Err(Error::Config(format!(
            "failed to parse {}: {e}",
            path.display()
        ))),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            Ok(TomlConfig::default())
        }
    }
}

/// Non-empty environment variable lookup
fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}
