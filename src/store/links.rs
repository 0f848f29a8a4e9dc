use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::json_file::JsonFile;
use super::StoreError;
use crate::models::link::LinkRecord;

/// File name of the link record inside the data directory.
pub const LINKS_FILE: &str = "account-links.json";

/// Durable storage for the link table.
///
/// Read-modify-write sequencing is the caller's job; the store only
/// guarantees that each write replaces the whole record.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Current link set. A missing record is bootstrapped to `{ "links": [] }`.
    async fn read_links(&self) -> Result<LinkRecord, StoreError>;

    /// Replace the link set.
    async fn write_links(&self, record: &LinkRecord) -> Result<(), StoreError>;
}

/// Link table kept in `<data_dir>/account-links.json`.
#[derive(Debug, Clone)]
pub struct FileLinkStore {
    file: JsonFile,
}

impl FileLinkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(data_dir.into().join(LINKS_FILE))
    }

    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }
}

#[async_trait]
impl LinkStore for FileLinkStore {
    async fn read_links(&self) -> Result<LinkRecord, StoreError> {
        self.file.read_or_init().await
    }

    async fn write_links(&self, record: &LinkRecord) -> Result<(), StoreError> {
        self.file.write(record).await?;
        tracing::debug!(path = %self.file.path().display(), links = record.links.len(), "link record written");
        Ok(())
    }
}

/// Process-local link table, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLinkStore {
    record: RwLock<LinkRecord>,
}

impl MemoryLinkStore {
    pub fn new(record: LinkRecord) -> Self {
        Self {
            record: RwLock::new(record),
        }
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn read_links(&self) -> Result<LinkRecord, StoreError> {
        Ok(self.record.read().await.clone())
    }

    async fn write_links(&self, record: &LinkRecord) -> Result<(), StoreError> {
        *self.record.write().await = record.clone();
        Ok(())
    }
}
