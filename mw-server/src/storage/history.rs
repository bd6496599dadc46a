//! Notification history store
//!
//! An append-only log of notification events, persisted newest first. Ids
//! are assigned at append time as `max(existing) + 1`, so they stay unique
//! and monotonically increasing even after individual deletions.

use crate::models::NotificationRecord;
use mw_common::{store, Result};
use std::path::PathBuf;

/// Handle to the persisted notification history
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the full history, newest first.
    pub fn load(&self) -> Vec<NotificationRecord> {
        store::load_json(&self.path, Vec::new())
    }

    /// Append a record, assigning its id, and return it as persisted.
    pub fn append(&self, mut record: NotificationRecord) -> Result<NotificationRecord> {
        let mut records = self.load();
        record.id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        records.insert(0, record.clone());
        store::save_json(&self.path, &records)?;
        Ok(record)
    }

    /// Remove one record by id; returns how many were removed (0 or 1).
    pub fn remove(&self, id: u64) -> Result<usize> {
        let mut records = self.load();
        let before = records.len();
        records.retain(|r| r.id != id);
        let removed = before - records.len();
        if removed > 0 {
            store::save_json(&self.path, &records)?;
        }
        Ok(removed)
    }

    /// Delete the entire history; returns how many records were removed.
    pub fn clear(&self) -> Result<usize> {
        let removed = self.load().len();
        store::save_json(&self.path, &Vec::<NotificationRecord>::new())?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn store() -> (TempDir, HistoryStore) {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("notifications.json"));
        (dir, store)
    }

    fn update_record(series_id: u64) -> NotificationRecord {
        NotificationRecord::chapter_update(
            series_id,
            "Berserk",
            699,
            700,
            1,
            "Berserk now has 700 chapters. You're 1 behind.",
            BTreeMap::new(),
            true,
        )
    }

    #[test]
    fn test_first_record_gets_id_one() {
        let (_dir, store) = store();
        let rec = store.append(update_record(270)).unwrap();
        assert_eq!(rec.id, 1);
    }

    #[test]
    fn test_ids_increase_and_newest_is_first() {
        let (_dir, store) = store();
        store.append(update_record(1)).unwrap();
        store.append(update_record(2)).unwrap();
        let third = store.append(update_record(3)).unwrap();
        assert_eq!(third.id, 3);

        let records = store.load();
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_id_assignment_survives_deletions() {
        let (_dir, store) = store();
        store.append(update_record(1)).unwrap();
        let second = store.append(update_record(2)).unwrap();
        store.append(update_record(3)).unwrap();

        // Removing the middle record must not let ids regress
        assert_eq!(store.remove(second.id).unwrap(), 1);
        let fourth = store.append(update_record(4)).unwrap();
        assert_eq!(fourth.id, 4);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let (_dir, store) = store();
        store.append(update_record(1)).unwrap();
        assert_eq!(store.remove(99).unwrap(), 0);
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_clear_reports_count() {
        let (_dir, store) = store();
        store.append(update_record(1)).unwrap();
        store.append(update_record(2)).unwrap();
        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.load().is_empty());
    }
}
