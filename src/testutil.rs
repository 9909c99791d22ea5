//! Shared test helpers for csv-agent unit tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Config, EngineConfig, QueryConfig, ServerConfig, StorageBackend, StorageConfig};
use crate::engine::{EngineError, ReasoningEngine};
use crate::storage::Database;
use crate::AppState;

pub const TEST_TOKEN: &str = "test-token";

/// Reasoning engine double that answers from a canned response and records
/// what it was handed.
pub struct StubEngine {
    calls: AtomicUsize,
    delay: Option<Duration>,
    response: Result<serde_json::Value, String>,
    seen: Mutex<Vec<Vec<u8>>>,
}

impl StubEngine {
    pub fn answering(response: serde_json::Value) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
            response: Ok(response),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            ..Self::answering(serde_json::Value::Null)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// File contents as they existed on disk during the most recent call.
    pub fn last_contents(&self) -> Vec<Vec<u8>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningEngine for StubEngine {
    async fn invoke(
        &self,
        _query: &str,
        files: &[PathBuf],
    ) -> Result<serde_json::Value, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut contents = Vec::with_capacity(files.len());
        for path in files {
            let data = std::fs::read(path).map_err(|source| EngineError::Input {
                path: path.clone(),
                source,
            })?;
            contents.push(data);
        }
        *self.seen.lock().unwrap() = contents;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.response {
            Ok(value) => Ok(value.clone()),
            Err(message) => Err(EngineError::Backend(message.clone())),
        }
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Create a test config rooted in a temporary directory.
pub fn test_config(temp_dir: &tempfile::TempDir, api_token: Option<&str>) -> Config {
    Config {
        server: ServerConfig::default(),
        storage: StorageConfig {
            backend: StorageBackend::Redb,
            data_dir: temp_dir.path().join("data"),
            scratch_dir: temp_dir.path().join("scratch"),
        },
        engine: EngineConfig::default(),
        query: QueryConfig::default(),
        api_token: api_token.map(str::to_string),
        max_upload_size: 1024 * 1024, // 1MB for tests
    }
}

/// Create a test AppState with a temporary redb database and the given engine.
pub fn test_state(
    temp_dir: &tempfile::TempDir,
    engine: Arc<StubEngine>,
    api_token: Option<&str>,
) -> Arc<AppState> {
    let config = test_config(temp_dir, api_token);
    let db = Database::open(&config.storage.data_dir).expect("Failed to open test database");
    let state =
        AppState::new(config, Arc::new(db), engine).expect("Failed to create test state");
    Arc::new(state)
}
