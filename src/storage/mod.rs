pub mod db;
mod files;
pub mod models;
pub mod sqlite;
mod tables;

pub use db::{Database, DatabaseError};
pub use models::{FileId, FileRecord};
pub use sqlite::SqliteStore;
pub use tables::*;

use std::cmp::Ordering;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Redb(#[from] DatabaseError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Durable store for file records and their content.
///
/// Every operation is atomic on its own: a record becomes visible together
/// with its content, and a delete removes both or neither. Ids are assigned
/// by the store, strictly increasing and never reused.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist a new file and return its record once the write has committed.
    async fn put(&self, filename: &str, content: Bytes) -> Result<FileRecord, StorageError>;
    /// Resolve an id to its content. `None` when the id is unknown or deleted.
    async fn get(&self, id: FileId) -> Result<Option<Bytes>, StorageError>;
    /// All records, newest first.
    async fn list(&self) -> Result<Vec<FileRecord>, StorageError>;
    /// Remove a record and its content. Returns whether the record existed.
    async fn delete(&self, id: FileId) -> Result<bool, StorageError>;
    /// Cheap liveness probe for health reporting.
    async fn ping(&self) -> bool;
}

/// Ordering used by every backend for listings: `created_at` descending,
/// ties broken by id descending.
pub(crate) fn newest_first(a: &FileRecord, b: &FileRecord) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}
