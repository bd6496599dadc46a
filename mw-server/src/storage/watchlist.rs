//! Watchlist store
//!
//! The watchlist is a single JSON array in stored order. The reconciliation
//! engine reads it once per pass and writes it back once as a batch; the
//! HTTP handlers use the same load-modify-save cycle for edits.

use crate::models::TrackedItem;
use mw_common::{store, Result};
use std::path::PathBuf;

/// Handle to the persisted watchlist
#[derive(Debug, Clone)]
pub struct WatchlistStore {
    path: PathBuf,
}

impl WatchlistStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load all tracked items in stored order. A missing file is an empty
    /// watchlist.
    pub fn load(&self) -> Vec<TrackedItem> {
        store::load_json(&self.path, Vec::new())
    }

    /// Persist the full watchlist atomically.
    pub fn save(&self, items: &[TrackedItem]) -> Result<()> {
        store::save_json(&self.path, &items)
    }

    /// Find an item by series id.
    pub fn find<'a>(items: &'a [TrackedItem], id: u64) -> Option<&'a TrackedItem> {
        items.iter().find(|it| it.id == id)
    }

    /// Find an item mutably by series id.
    pub fn find_mut(items: &mut [TrackedItem], id: u64) -> Option<&mut TrackedItem> {
        items.iter_mut().find(|it| it.id == id)
    }
}
