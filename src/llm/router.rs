//! Tiered LLM router with retry, confidence gating and semantic caching.
//!
//! `route` sanitizes the prompt, consults the cache when a model is named,
//! then walks the tiers in priority order. Each tier gets its own retry
//! budget for transient failures; a response is accepted only if the tier's
//! assigned confidence clears the gate. Per-tier failures are logged and
//! absorbed; only exhaustion is surfaced.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::cache::SemanticCache;
use super::retry::RetryPolicy;
use super::{Completion, CompletionRequest, LlmResponse, ProviderAdapter};
use crate::config::ProviderTier;
use crate::constants::{events, provider};
use crate::error::{ProviderError, RouterError};
use crate::sanitize::Sanitizer;

/// A configured tier bound to its adapter.
pub struct Tier {
    pub config: ProviderTier,
    adapter: Arc<dyn ProviderAdapter>,
    credential_present: bool,
}

impl Tier {
    pub fn new(config: ProviderTier, adapter: Arc<dyn ProviderAdapter>, credential_present: bool) -> Self {
        Self {
            config,
            adapter,
            credential_present,
        }
    }

    pub fn is_available(&self) -> bool {
        self.credential_present
    }
}

#[derive(Clone, Debug)]
pub struct RouteRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Overrides every tier's `min_confidence` when set.
    pub confidence_threshold: Option<f64>,
    /// Text the cache embeds instead of the full prompt
    pub cache_text: Option<String>,
    /// Cache partition, typically the asking agent's phase
    pub cache_scope: Option<String>,
}

impl RouteRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            max_tokens: provider::DEFAULT_MAX_TOKENS,
            temperature: provider::DEFAULT_TEMPERATURE,
            confidence_threshold: None,
            cache_text: None,
            cache_scope: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    /// Key the cache on `text` within `scope` rather than on the whole prompt.
    pub fn with_cache_key(mut self, scope: impl Into<String>, text: impl Into<String>) -> Self {
        self.cache_scope = Some(scope.into());
        self.cache_text = Some(text.into());
        self
    }
}

pub struct LlmRouter {
    tiers: Vec<Tier>,
    cache: Option<Arc<SemanticCache>>,
    sanitizer: Arc<dyn Sanitizer>,
    retry: RetryPolicy,
    permits: Arc<Semaphore>,
}

impl LlmRouter {
    pub fn new(
        tiers: Vec<Tier>,
        cache: Option<Arc<SemanticCache>>,
        sanitizer: Arc<dyn Sanitizer>,
        retry: RetryPolicy,
        max_concurrent: usize,
    ) -> Self {
        Self {
            tiers,
            cache,
            sanitizer,
            retry,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn cache(&self) -> Option<&Arc<SemanticCache>> {
        self.cache.as_ref()
    }

    pub async fn route(&self, request: RouteRequest) -> Result<LlmResponse, RouterError> {
        // Nothing leaves the process unsanitized.
        let prompt = self.sanitizer.sanitize(&request.prompt);

        let cache_text = match request.cache_text.as_deref() {
            Some(text) => self.sanitizer.sanitize(text),
            None => prompt.clone(),
        };
        let cache_scope = request.cache_scope.as_deref().unwrap_or_default();

        if let (Some(cache), Some(model)) = (&self.cache, request.model.as_deref()) {
            if let Some(hit) = cache.check(&cache_text, model, cache_scope).await {
                // A stricter gate than the one the entry passed turns the hit into a miss.
                match request.confidence_threshold {
                    Some(threshold) if hit.confidence < threshold => {
                        info!(
                            "💾 [ROUTER] Cached confidence {:.2} below threshold {:.2}, ignoring hit",
                            hit.confidence, threshold
                        );
                    }
                    _ => {
                        info!(event = events::CACHE_HIT, "💾 [ROUTER] Served from cache (model: {})", model);
                        return Ok(hit);
                    }
                }
            }
        }

        let mut attempted = Vec::new();

        for tier in &self.tiers {
            let tier_name = tier.config.name.as_str();
            if !tier.is_available() {
                info!("⏭️ [ROUTER] Skipping tier '{}' (no credential)", tier_name);
                continue;
            }
            let Some(model) = tier.config.resolve_model(request.model.as_deref()) else {
                warn!("⏭️ [ROUTER] Tier '{}' lists no models, skipping", tier_name);
                continue;
            };
            attempted.push(tier_name.to_string());

            let call = CompletionRequest {
                prompt: prompt.clone(),
                model: model.clone(),
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            };

            let started = Instant::now();
            let completion = match self.call_with_retry(tier, &call).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(
                        event = events::TIER_FALLTHROUGH,
                        "⚠️ [ROUTER] Tier '{}' failed after {}ms: {}",
                        tier_name,
                        started.elapsed().as_millis(),
                        e
                    );
                    continue;
                }
            };

            let confidence = tier.config.confidence;
            let threshold = request.confidence_threshold.unwrap_or(tier.config.min_confidence);
            if confidence < threshold {
                warn!(
                    event = events::TIER_FALLTHROUGH,
                    "⚠️ [ROUTER] Tier '{}' confidence {:.2} below threshold {:.2}, falling through",
                    tier_name,
                    confidence,
                    threshold
                );
                continue;
            }

            let response = LlmResponse {
                content: completion.content,
                confidence,
                provider: tier_name.to_string(),
                model,
                tokens_used: completion.tokens_used,
                cached: false,
            };

            if let (Some(cache), Some(requested)) = (&self.cache, request.model.as_deref()) {
                cache.store(&cache_text, requested, cache_scope, &response).await;
            }

            info!(
                "✅ [ROUTER] Tier '{}' answered in {}ms ({} tokens, confidence {:.2})",
                tier_name,
                started.elapsed().as_millis(),
                response.tokens_used,
                confidence
            );
            return Ok(response);
        }

        warn!(event = events::PROVIDERS_EXHAUSTED, "❌ [ROUTER] All tiers exhausted (attempted: {:?})", attempted);
        Err(RouterError::NoProviderAvailable { attempted })
    }

    /// Call one tier under its retry budget. Only transient errors are retried.
    async fn call_with_retry(&self, tier: &Tier, call: &CompletionRequest) -> Result<Completion, ProviderError> {
        let max_attempts = tier.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let result = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| ProviderError::Permanent("router is shutting down".to_string()))?;
                match tokio::time::timeout(tier.config.timeout(), tier.adapter.call(call)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Transient(format!(
                        "timed out after {}s",
                        tier.config.timeout_secs
                    ))),
                }
            };

            let err = match result {
                Ok(c) if c.content.trim().is_empty() => ProviderError::Parse("empty completion".to_string()),
                Ok(c) => return Ok(c),
                Err(e) => e,
            };

            attempt += 1;
            if !err.is_transient() || attempt >= max_attempts {
                return Err(err);
            }

            let delay = self.retry.delay(attempt - 1);
            warn!(
                "🔁 [ROUTER] Tier '{}' attempt {}/{} failed ({}), retrying in {}ms",
                tier.config.name,
                attempt,
                max_attempts,
                err,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}
