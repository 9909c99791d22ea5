//! Upload validation and the registry operations served over HTTP.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::storage::{FileId, FileRecord, FileStore, StorageError};

/// The only extension accepted for uploads. Matched exactly, so `.CSV` is
/// rejected.
pub const ACCEPTED_EXTENSION: &str = ".csv";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

/// Front door of the durable store for upload, list and delete.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn FileStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self { store }
    }

    /// Validate and persist an uploaded file. The returned record carries the
    /// sanitized filename and is only produced after the store committed.
    pub async fn upload(&self, filename: &str, content: Bytes) -> Result<FileRecord, RegistryError> {
        let filename = validate_filename(filename)?;
        let file = self.store.put(&filename, content).await?;
        tracing::debug!(file_id = %file.id, filename = %file.filename, "Registered file");
        Ok(file)
    }

    pub async fn list(&self) -> Result<Vec<FileRecord>, RegistryError> {
        Ok(self.store.list().await?)
    }

    /// Returns `false` when no record had this id.
    pub async fn delete(&self, id: FileId) -> Result<bool, RegistryError> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            tracing::debug!(file_id = %id, "Deleted file");
        }
        Ok(deleted)
    }

    pub async fn is_healthy(&self) -> bool {
        self.store.ping().await
    }
}

/// Check the client-supplied name and return its sanitized form.
pub fn validate_filename(raw: &str) -> Result<String, RegistryError> {
    if raw.trim().is_empty() {
        return Err(RegistryError::Validation("No selected file".to_string()));
    }
    if !has_accepted_extension(raw) {
        return Err(RegistryError::Validation(
            "Only CSV files are supported".to_string(),
        ));
    }

    let sanitized = sanitize_filename(raw);
    if !has_accepted_extension(&sanitized) || sanitized.len() <= ACCEPTED_EXTENSION.len() {
        return Err(RegistryError::Validation(format!(
            "Filename '{raw}' is not usable after sanitization"
        )));
    }
    Ok(sanitized)
}

fn has_accepted_extension(name: &str) -> bool {
    name.ends_with(ACCEPTED_EXTENSION)
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Accented letters are transliterated through NFKD, directory components
/// are dropped, whitespace becomes `_`, anything outside `[A-Za-z0-9._-]` is
/// removed and leading/trailing `.` and `_` are trimmed.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let decomposed: String = base.nfkd().filter(char::is_ascii).collect();

    let cleaned: String = decomposed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    cleaned.trim_matches(['.', '_']).to_string()
}
