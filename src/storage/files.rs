use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{FileId, FileRecord};
use super::tables::*;
use super::{newest_first, FileStore, StorageError};

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Assign the next id and store the record and its content in one
    /// transaction. Nothing is visible to readers until the commit succeeds.
    pub fn insert_file(&self, filename: &str, content: &[u8]) -> Result<FileRecord, DatabaseError> {
        debug_assert!(!filename.is_empty(), "filename must not be empty");

        let write_txn = self.begin_write()?;
        let file = {
            let mut counters = write_txn.open_table(COUNTERS)?;
            let id = counters
                .get(NEXT_FILE_ID)?
                .map(|v| v.value())
                .unwrap_or(1);
            let next = id.checked_add(1).ok_or(DatabaseError::IdExhausted)?;
            counters.insert(NEXT_FILE_ID, next)?;

            let file = FileRecord {
                id: FileId(id),
                filename: filename.to_string(),
                byte_size: content.len() as u64,
                created_at: Utc::now(),
            };

            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(&file)?;
            table.insert(id, data.as_slice())?;

            let mut contents = write_txn.open_table(FILE_CONTENTS)?;
            contents.insert(id, content)?;

            file
        };
        write_txn.commit()?;
        Ok(file)
    }

    /// Get the stored content of a file
    pub fn get_content(&self, id: FileId) -> Result<Option<Vec<u8>>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILE_CONTENTS)?;
        let content = table.get(id.0)?.map(|data| data.value().to_vec());
        Ok(content)
    }

    /// Delete a file record and its content in one transaction
    pub fn delete_file(&self, id: FileId) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(FILES)?;
            let removed = table.remove(id.0)?.is_some();

            let mut contents = write_txn.open_table(FILE_CONTENTS)?;
            contents.remove(id.0)?;

            removed
        };
        write_txn.commit()?;
        Ok(deleted)
    }

    /// Get all file records, newest first
    pub fn list_files(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let file: FileRecord = rmp_serde::from_slice(value.value())?;
            files.push(file);
        }

        files.sort_by(newest_first);
        Ok(files)
    }

    /// Run a blocking database operation off the async runtime.
    async fn blocking<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, DatabaseError> + Send + 'static,
    {
        let db = self.clone();
        let result = tokio::task::spawn_blocking(move || op(&db)).await?;
        Ok(result?)
    }
}

#[async_trait]
impl FileStore for Database {
    async fn put(&self, filename: &str, content: Bytes) -> Result<FileRecord, StorageError> {
        let filename = filename.to_string();
        self.blocking(move |db| db.insert_file(&filename, &content))
            .await
    }

    async fn get(&self, id: FileId) -> Result<Option<Bytes>, StorageError> {
        let content = self.blocking(move |db| db.get_content(id)).await?;
        Ok(content.map(Bytes::from))
    }

    async fn list(&self) -> Result<Vec<FileRecord>, StorageError> {
        self.blocking(|db| db.list_files()).await
    }

    async fn delete(&self, id: FileId) -> Result<bool, StorageError> {
        self.blocking(move |db| db.delete_file(id)).await
    }

    async fn ping(&self) -> bool {
        self.blocking(|db| {
            let read_txn = db.begin_read()?;
            let _ = read_txn.open_table(COUNTERS)?;
            Ok(())
        })
        .await
        .is_ok()
    }
}
