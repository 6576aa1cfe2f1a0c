use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Completion, CompletionRequest, ProviderAdapter};
use crate::error::ProviderError;

/// Adapter for a local Ollama server (`/api/generate`, non-streaming).
pub struct OllamaAdapter {
    name: String,
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaAdapter {
    pub fn new(name: String, base_url: String) -> Self {
        Self {
            name,
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!("🤖 [{}] POST {} (model: {})", self.name, url, request.model);

        let body = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        if parsed.response.trim().is_empty() {
            return Err(ProviderError::Parse("empty generation".to_string()));
        }

        let tokens_used = parsed.prompt_eval_count.unwrap_or(0) + parsed.eval_count.unwrap_or(0);
        Ok(Completion {
            content: parsed.response,
            tokens_used,
        })
    }
}
