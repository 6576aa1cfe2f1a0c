use std::sync::Arc;
use tracing::{info, warn};

use super::{
    anthropic::AnthropicAdapter, cache::SemanticCache, embedding::build_embedder, ollama::OllamaAdapter,
    openai::OpenAiAdapter, retry::RetryPolicy, router::{LlmRouter, Tier}, ProviderAdapter,
};
use crate::config::{AppConfig, ProviderKind, ProviderTier};
use crate::sanitize::{PatternSanitizer, Sanitizer};

/// Read a tier's credential from its configured env var. Empty counts as absent.
fn read_credential(tier: &ProviderTier) -> Option<String> {
    let var = tier.api_key_env.as_deref()?;
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

pub fn build_adapter(tier: &ProviderTier, api_key: Option<String>) -> Arc<dyn ProviderAdapter> {
    let name = tier.name.clone();
    let base_url = tier.base_url.clone();
    match tier.kind {
        ProviderKind::Openai => Arc::new(OpenAiAdapter::new(name, api_key.unwrap_or_default(), base_url)),
        ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(name, api_key.unwrap_or_default(), base_url)),
        ProviderKind::Ollama => Arc::new(OllamaAdapter::new(name, base_url)),
    }
}

pub fn build_tiers(config: &AppConfig) -> Vec<Tier> {
    config
        .tiers
        .iter()
        .map(|tier_config| {
            let credential = read_credential(tier_config);
            let credential_present = tier_config.api_key_env.is_none() || credential.is_some();
            if !credential_present {
                warn!(
                    "⚠️ [ROUTER] Tier '{}' has no credential (${}), it will be skipped",
                    tier_config.name,
                    tier_config.api_key_env.as_deref().unwrap_or_default()
                );
            }
            let adapter = build_adapter(tier_config, credential);
            Tier::new(tier_config.clone(), adapter, credential_present)
        })
        .collect()
}

/// Assemble the router with its cache and sanitizer from config.
pub fn build_router(config: &AppConfig) -> LlmRouter {
    let tiers = build_tiers(config);
    info!(
        "🧭 [ROUTER] Tier order: {}",
        tiers.iter().map(|t| t.config.name.as_str()).collect::<Vec<_>>().join(" -> ")
    );

    let cache = if config.cache.enabled {
        let embedder = build_embedder(&config.cache.embedding);
        Some(Arc::new(SemanticCache::from_config(embedder, &config.cache)))
    } else {
        None
    };

    let sanitizer: Arc<dyn Sanitizer> = Arc::new(PatternSanitizer::new());

    LlmRouter::new(tiers, cache, sanitizer, RetryPolicy::from_config(&config.router.retry), config.router.max_concurrent)
}
