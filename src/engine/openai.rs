use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{EngineError, ReasoningEngine};
use crate::config::EngineConfig;

const SYSTEM_PROMPT: &str = "You are a careful data analyst. Answer the user's question using only \
the CSV files provided below. Compute exact figures where the data allows it and say so plainly \
when it does not.";

/// Reasoning engine backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiEngine {
    api_key: Option<String>,
    base_url: String,
    client: Client,
    model: String,
}

impl OpenAiEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            model: config.model.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn build_context(files: &[PathBuf]) -> Result<String, EngineError> {
        let mut context = String::new();
        for path in files {
            let data = tokio::fs::read(path)
                .await
                .map_err(|source| EngineError::Input {
                    path: path.clone(),
                    source,
                })?;
            context.push_str(&format!(
                "### File: {}\n```csv\n{}\n```\n\n",
                display_name(path),
                String::from_utf8_lossy(&data).trim_end()
            ));
        }
        Ok(context)
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiEngine {
    async fn invoke(
        &self,
        query: &str,
        files: &[PathBuf],
    ) -> Result<serde_json::Value, EngineError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EngineError::NotConfigured("OPENAI_API_KEY is not set".to_string()))?;

        let context = Self::build_context(files).await?;
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": format!("{SYSTEM_PROMPT}\n\n{context}") },
                { "role": "user", "content": query },
            ],
        });

        let resp = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Backend(format!(
                "chat completion failed ({status}): {body}"
            )));
        }

        let response: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EngineError::Backend(format!("unreadable response: {e}")))?;

        Ok(normalize_completion(query, response))
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Lift the first choice's message into the `{input, output}` shape. Any other
/// response is passed through untouched.
fn normalize_completion(query: &str, response: serde_json::Value) -> serde_json::Value {
    match response
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
    {
        Some(content) => json!({ "input": query, "output": content }),
        None => response,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lifts_first_choice() {
        let response = json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "42" } }],
        });
        assert_eq!(
            normalize_completion("sum column A", response),
            json!({ "input": "sum column A", "output": "42" })
        );
    }

    #[test]
    fn test_normalize_passes_through_unknown_shapes() {
        let response = json!({ "choices": [] });
        assert_eq!(normalize_completion("q", response.clone()), response);
    }

    #[tokio::test]
    async fn test_invoke_without_key_is_not_configured() {
        let engine = OpenAiEngine::new(&EngineConfig::default()).unwrap();
        assert!(!engine.is_configured());
        let result = engine.invoke("q", &[]).await;
        assert!(matches!(result, Err(EngineError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_build_context_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("csv_9.csv");
        let result = OpenAiEngine::build_context(&[missing]).await;
        assert!(matches!(result, Err(EngineError::Input { .. })));
    }

    #[tokio::test]
    async fn test_build_context_embeds_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csv_1.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let context = OpenAiEngine::build_context(&[path]).await.unwrap();
        assert!(context.contains("### File: csv_1.csv"));
        assert!(context.contains("a,b\n1,2"));
    }
}
