//! [`SqliteStore`], the SQLite implementation of [`FileStore`].
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::OptionalExtension as _;

use super::models::{FileId, FileRecord};
use super::{FileStore, StorageError};

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// `AUTOINCREMENT` keeps ids from being reused after the highest row is
/// deleted.
const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS files (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    filename    TEXT    NOT NULL,
    byte_size   INTEGER NOT NULL,
    file_data   BLOB    NOT NULL,
    created_at  TEXT    NOT NULL   -- RFC 3339 UTC, fixed microsecond width
);

CREATE INDEX IF NOT EXISTS files_created_idx ON files(created_at);
";

/// A file store backed by a single SQLite file.
///
/// Clones share one connection thread.
#[derive(Clone)]
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

/// Row shape shared by the listing queries, decoded outside the connection thread.
type RawRecord = (i64, String, i64, String);

impl SqliteStore {
    /// Open (or create) a store at `path` and run schema initialisation.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = tokio_rusqlite::Connection::open(path).await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory store for tests.
    pub async fn open_in_memory() -> Result<Self, StorageError> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FileStore for SqliteStore {
    async fn put(&self, filename: &str, content: Bytes) -> Result<FileRecord, StorageError> {
        let created_at = Utc::now().trunc_subsecs(6);
        let created_at_str = encode_dt(created_at);
        let filename_owned = filename.to_string();
        let byte_size = content.len() as u64;

        let id = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO files (filename, byte_size, file_data, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        filename_owned,
                        byte_size as i64,
                        &content[..],
                        created_at_str
                    ],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(id)
            })
            .await?;

        Ok(FileRecord {
            id: decode_id(id)?,
            filename: filename.to_string(),
            byte_size,
            created_at,
        })
    }

    async fn get(&self, id: FileId) -> Result<Option<Bytes>, StorageError> {
        let Ok(key) = i64::try_from(id.0) else {
            return Ok(None);
        };

        let content: Option<Vec<u8>> = self
            .conn
            .call(move |conn| {
                let data = conn
                    .query_row(
                        "SELECT file_data FROM files WHERE id = ?1",
                        rusqlite::params![key],
                        |r| r.get(0),
                    )
                    .optional()?;
                Ok(data)
            })
            .await?;

        Ok(content.map(Bytes::from))
    }

    async fn list(&self) -> Result<Vec<FileRecord>, StorageError> {
        let rows: Vec<RawRecord> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, filename, byte_size, created_at
                     FROM files
                     ORDER BY created_at DESC, id DESC",
                )?;
                let rows = stmt
                    .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, filename, byte_size, created_at)| {
                Ok(FileRecord {
                    id: decode_id(id)?,
                    filename,
                    byte_size: u64::try_from(byte_size)
                        .map_err(|_| StorageError::Corrupt(format!("negative byte_size {byte_size}")))?,
                    created_at: decode_dt(&created_at)?,
                })
            })
            .collect()
    }

    async fn delete(&self, id: FileId) -> Result<bool, StorageError> {
        let Ok(key) = i64::try_from(id.0) else {
            return Ok(false);
        };

        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM files WHERE id = ?1", rusqlite::params![key])?;
                Ok(n)
            })
            .await?;

        Ok(removed > 0)
    }

    async fn ping(&self) -> bool {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;
                Ok(())
            })
            .await
            .is_ok()
    }
}

// ─── Encoding ────────────────────────────────────────────────────────────────

fn encode_dt(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_dt(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad created_at '{raw}': {e}")))
}

fn decode_id(raw: i64) -> Result<FileId, StorageError> {
    u64::try_from(raw)
        .map(FileId)
        .map_err(|_| StorageError::Corrupt(format!("negative file id {raw}")))
}
