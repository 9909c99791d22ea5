mod openai;

pub use openai::OpenAiEngine;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Reasoning engine not configured: {0}")]
    NotConfigured(String),
    #[error("Failed to read input file {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Reasoning engine request failed: {0}")]
    Transport(String),
    #[error("Reasoning engine error: {0}")]
    Backend(String),
    #[error("Reasoning engine did not answer within {0} seconds")]
    Timeout(u64),
}

/// An external engine that answers a question about a set of local CSV files.
///
/// The engine's response shape is its own business; callers normalize it with
/// [`EngineOutput::from_response`].
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn invoke(&self, query: &str, files: &[PathBuf])
        -> Result<serde_json::Value, EngineError>;

    /// Whether the engine has the credentials it needs to be called.
    fn is_configured(&self) -> bool;
}

/// Engine response reduced to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutput {
    /// The response carried a canonical `output` field.
    Structured(String),
    /// No `output` field; the whole response rendered as JSON text.
    Raw(String),
}

impl EngineOutput {
    pub fn from_response(response: serde_json::Value) -> Self {
        let output = match response.get("output") {
            Some(serde_json::Value::String(text)) => Some(text.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        match (output, response) {
            (Some(text), _) => EngineOutput::Structured(text),
            (None, serde_json::Value::String(text)) => EngineOutput::Raw(text),
            (None, other) => EngineOutput::Raw(other.to_string()),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            EngineOutput::Structured(text) | EngineOutput::Raw(text) => text,
        }
    }
}
