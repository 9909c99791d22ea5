//! csv-agent - Ask natural-language questions about uploaded CSV files
//!
//! This crate provides authenticated CSV ingestion and query dispatch with:
//! - Swappable durable stores for file records (redb, SQLite)
//! - Per-dispatch scratch copies of stored files, always cleaned up
//! - A pluggable reasoning engine (OpenAI chat completions by default)
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod materializer;
pub mod registry;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use dispatch::QueryDispatcher;
use engine::ReasoningEngine;
use materializer::Materializer;
use registry::Registry;
use storage::FileStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub dispatcher: QueryDispatcher,
    pub registry: Registry,
}

impl AppState {
    /// Wire the registry and dispatcher around one store and one engine.
    pub fn new(
        config: Config,
        store: Arc<dyn FileStore>,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Result<Self, std::io::Error> {
        let materializer = Materializer::new(&config.storage.scratch_dir)?;
        let dispatcher = QueryDispatcher::new(Arc::clone(&store), materializer, engine)
            .with_timeout(config.engine.timeout)
            .with_max_files(config.query.max_files);

        Ok(Self {
            config,
            dispatcher,
            registry: Registry::new(store),
        })
    }
}
