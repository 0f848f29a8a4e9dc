//! Durable flat-file records: the account link table and per-account sync
//! status. Each record is one JSON document replaced wholesale on write.

pub mod json_file;
pub mod links;
pub mod sync_status;

use std::path::PathBuf;

use thiserror::Error;

pub use links::{FileLinkStore, LinkStore, MemoryLinkStore};
pub use sync_status::SyncStatusStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid record: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
}
