use std::path::PathBuf;

use tokio::sync::Mutex;

use super::json_file::JsonFile;
use super::StoreError;
use crate::models::sync::{AccountSyncStatus, SyncStatusRecord};

pub const SYNC_STATUS_FILE: &str = "sync-status.json";

/// Per-account sync status kept in `<data_dir>/sync-status.json`.
///
/// Updates are serialized so concurrent syncs of different accounts do not
/// overwrite each other's entries.
#[derive(Debug)]
pub struct SyncStatusStore {
    file: JsonFile,
    lock: Mutex<()>,
}

impl SyncStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
            lock: Mutex::new(()),
        }
    }

    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(data_dir.into().join(SYNC_STATUS_FILE))
    }

    pub async fn all(&self) -> Result<SyncStatusRecord, StoreError> {
        let _guard = self.lock.lock().await;
        self.file.read_or_init().await
    }

    pub async fn get(&self, account_id: &str) -> Result<AccountSyncStatus, StoreError> {
        Ok(self.all().await?.remove(account_id).unwrap_or_default())
    }

    /// Apply `update` to one account's entry and persist the record.
    pub async fn update<F>(&self, account_id: &str, update: F) -> Result<AccountSyncStatus, StoreError>
    where
        F: FnOnce(&mut AccountSyncStatus) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut record: SyncStatusRecord = self.file.read_or_init().await?;
        let entry = record.entry(account_id.to_string()).or_default();
        update(entry);
        let updated = entry.clone();
        self.file.write(&record).await?;
        Ok(updated)
    }

    /// Clear a stuck `isSyncing` flag left behind by a crashed run.
    pub async fn reset_in_progress(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut record: SyncStatusRecord = self.file.read_or_init().await?;
        let mut cleared = 0;
        for status in record.values_mut().filter(|s| s.is_syncing) {
            status.is_syncing = false;
            cleared += 1;
        }
        if cleared > 0 {
            self.file.write(&record).await?;
        }
        Ok(cleared)
    }
}
