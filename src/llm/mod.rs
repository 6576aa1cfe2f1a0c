pub mod anthropic;
pub mod cache;
pub mod embedding;
pub mod factory;
pub mod ollama;
pub mod openai;
pub mod retry;
pub mod router;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use cache::SemanticCache;
pub use embedding::{Embedder, HashingEmbedder};
pub use router::{LlmRouter, RouteRequest};

#[cfg(test)]
mod cache_tests;

/// Request handed to a provider adapter. The prompt is already sanitized.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Raw adapter output, before the router assigns confidence.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tokens_used: u32,
}

/// What `LlmRouter::route` hands back to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub confidence: f64,
    pub provider: String,
    pub model: String,
    pub tokens_used: u32,
    pub cached: bool,
}

/// Uniform call contract to one LLM backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn call(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;
}
