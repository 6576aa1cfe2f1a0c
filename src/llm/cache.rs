//! Semantic response cache keyed by request-embedding similarity.
//!
//! Callers pass the request-specific text (not the full prompt with its shared
//! instructions) plus a scope naming the agent that asked. Lookups compare the
//! text's embedding against every stored entry for the same model and scope
//! and return the best match above the similarity threshold.
//! Capacity is bounded; inserting past it evicts the single oldest entry.
//! If the embedder fails, lookups miss and stores are skipped.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::embedding::{cosine_similarity, Embedder};
use super::LlmResponse;
use crate::config::CacheConfig;

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub content: String,
    pub confidence: f64,
    pub provider: String,
    pub model: String,
    pub scope: String,
    pub tokens_used: u32,
    pub embedding: Vec<f32>,
    pub inserted_at: DateTime<Utc>,
}

impl CacheEntry {
    fn to_response(&self) -> LlmResponse {
        LlmResponse {
            content: self.content.clone(),
            confidence: self.confidence,
            provider: self.provider.clone(),
            model: self.model.clone(),
            tokens_used: self.tokens_used,
            cached: true,
        }
    }
}

pub struct SemanticCache {
    embedder: Arc<dyn Embedder>,
    // Front is oldest; eviction pops the front.
    entries: RwLock<VecDeque<CacheEntry>>,
    capacity: usize,
    threshold: f32,
}

impl SemanticCache {
    pub fn new(embedder: Arc<dyn Embedder>, capacity: usize, threshold: f32) -> Self {
        Self {
            embedder,
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            threshold,
        }
    }

    pub fn from_config(embedder: Arc<dyn Embedder>, config: &CacheConfig) -> Self {
        Self::new(embedder, config.capacity, config.similarity_threshold)
    }

    /// Best stored response for `model` and `scope` whose text is similar enough, if any.
    pub async fn check(&self, text: &str, model: &str, scope: &str) -> Option<LlmResponse> {
        let query = match self.embedder.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!("⚠️ [CACHE] Embedding unavailable, treating as miss: {}", e);
                return None;
            }
        };

        let entries = self.entries.read().await;
        let best = entries
            .iter()
            .filter(|entry| entry.model == model && entry.scope == scope)
            .map(|entry| (cosine_similarity(&query, &entry.embedding), entry))
            .filter(|(score, _)| *score >= self.threshold)
            .max_by(|a, b| a.0.total_cmp(&b.0));

        match best {
            Some((score, entry)) => {
                info!("💾 [CACHE] Hit for model {} scope '{}' (similarity {:.3})", model, scope, score);
                Some(entry.to_response())
            }
            None => {
                debug!("[CACHE] Miss for model {} ({} entries)", model, entries.len());
                None
            }
        }
    }

    pub async fn store(&self, text: &str, model: &str, scope: &str, response: &LlmResponse) {
        let embedding = match self.embedder.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!("⚠️ [CACHE] Embedding unavailable, not caching: {}", e);
                return;
            }
        };

        let entry = CacheEntry {
            content: response.content.clone(),
            confidence: response.confidence,
            provider: response.provider.clone(),
            model: model.to_string(),
            scope: scope.to_string(),
            tokens_used: response.tokens_used,
            embedding,
            inserted_at: Utc::now(),
        };

        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_front() {
                debug!(
                    "[CACHE] Evicted oldest entry (model {}, inserted {})",
                    evicted.model, evicted.inserted_at
                );
            }
        }
        entries.push_back(entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Stored entries, oldest first.
    pub async fn snapshot(&self) -> Vec<CacheEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
