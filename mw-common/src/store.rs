//! Atomic JSON file storage
//!
//! The watchlist and notification history live in small JSON files. Writes
//! go to a temporary sibling file first and are then renamed over the
//! destination, so a crash mid-write never leaves a truncated store behind.

use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Load a JSON file, falling back to `default` when the file is missing.
///
/// A file that exists but fails to parse also yields `default`; the parse
/// failure is logged rather than propagated so one corrupt store cannot
/// take the whole service down.
pub fn load_json<T: DeserializeOwned>(path: &Path, default: T) -> T {
    if !path.exists() {
        return default;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "store file is corrupt, using default");
                default
            }
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "store file unreadable, using default");
            default
        }
    }
}

/// Serialize `value` to `path`, atomically with respect to process crashes.
///
/// Writes to `<path>.tmp` then renames into place. Parent directories are
/// created as needed.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = tmp_path(path);
    let data = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
