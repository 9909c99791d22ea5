//! Query dispatch: validate, materialize, ask the engine, clean up.
//!
//! A dispatch moves through `Validating → Materializing → Invoking →
//! Finalizing → Done`. Bad input stops in `Validating` and an empty
//! materialization stops in `Materializing`, both before any engine call.
//! `Finalizing` releases the scratch files and runs on both exits of
//! `Invoking`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{EngineError, EngineOutput, ReasoningEngine};
use crate::materializer::{MaterializeError, Materializer};
use crate::storage::{FileId, FileStore};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("No valid files found")]
    NoFilesResolved,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Failed to prepare files: {0}")]
    Materialize(#[from] MaterializeError),
}

/// Body of `POST /query`. Both fields are optional here so that their absence
/// is reported as a validation failure rather than a decoding error.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub file_ids: Option<Vec<FileIdParam>>,
}

/// A requested file id, given as a JSON number or a decimal string.
///
/// Any other entry (negative or fractional numbers, `null`, booleans, nested
/// values) is kept as `Other` and simply never resolves.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FileIdParam {
    Number(u64),
    Text(String),
    Other(serde_json::Value),
}

impl FileIdParam {
    /// `None` for entries that are not a valid id; such entries can never resolve.
    pub fn to_file_id(&self) -> Option<FileId> {
        match self {
            FileIdParam::Number(n) => Some(FileId(*n)),
            FileIdParam::Text(s) => s.parse().ok(),
            FileIdParam::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryAnswer {
    pub query: String,
    pub result: String,
}

/// Runs queries against stored files through a [`ReasoningEngine`].
pub struct QueryDispatcher {
    engine: Arc<dyn ReasoningEngine>,
    materializer: Materializer,
    max_files: Option<usize>,
    store: Arc<dyn FileStore>,
    timeout: Option<Duration>,
}

impl QueryDispatcher {
    pub fn new(
        store: Arc<dyn FileStore>,
        materializer: Materializer,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Self {
        Self {
            engine,
            materializer,
            max_files: None,
            store,
            timeout: None,
        }
    }

    /// Deadline for the engine call. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upper bound on requested ids. `None` accepts any number.
    pub fn with_max_files(mut self, max_files: Option<usize>) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    pub fn engine_configured(&self) -> bool {
        self.engine.is_configured()
    }

    pub async fn dispatch(&self, request: QueryRequest) -> Result<QueryAnswer, DispatchError> {
        let (query, requested) = match (request.query, request.file_ids) {
            (Some(query), Some(ids)) => (query, ids),
            _ => {
                return Err(DispatchError::InvalidInput(
                    "Missing query or file_ids".to_string(),
                ))
            }
        };

        if let Some(max) = self.max_files {
            if requested.len() > max {
                return Err(DispatchError::InvalidInput(format!(
                    "At most {max} file_ids may be queried at once"
                )));
            }
        }

        let ids: Vec<FileId> = requested
            .iter()
            .filter_map(FileIdParam::to_file_id)
            .collect();

        let artifacts = self
            .materializer
            .materialize(self.store.as_ref(), &ids)
            .await?;

        if artifacts.is_empty() {
            artifacts.release().await;
            return Err(DispatchError::NoFilesResolved);
        }

        tracing::debug!(
            requested = requested.len(),
            artifacts = artifacts.len(),
            "Invoking reasoning engine"
        );
        let outcome = self.invoke(&query, artifacts.paths()).await;

        artifacts.release().await;

        let output = outcome?;
        Ok(QueryAnswer {
            query,
            result: output.into_text(),
        })
    }

    async fn invoke(&self, query: &str, paths: &[PathBuf]) -> Result<EngineOutput, EngineError> {
        let call = self.engine.invoke(query, paths);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| EngineError::Timeout(limit.as_secs()))??,
            None => call.await?,
        };
        Ok(EngineOutput::from_response(response))
    }
}
