//! Unit tests for SemanticCache - similarity lookup, model isolation, eviction.

#[cfg(test)]
mod cache_tests {
    use crate::error::EmbeddingError;
    use crate::llm::cache::SemanticCache;
    use crate::llm::embedding::{Embedder, HashingEmbedder};
    use crate::llm::LlmResponse;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct UnavailableEmbedder;

    #[async_trait]
    impl Embedder for UnavailableEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Unavailable("encoder offline".to_string()))
        }
    }

    fn response(content: &str) -> LlmResponse {
        LlmResponse {
            content: content.to_string(),
            confidence: 0.9,
            provider: "primary".to_string(),
            model: "gpt-4o".to_string(),
            tokens_used: 42,
            cached: false,
        }
    }

    fn cache(capacity: usize) -> SemanticCache {
        SemanticCache::new(Arc::new(HashingEmbedder::new(256)), capacity, 0.85)
    }

    // ============= Lookup Tests =============

    #[tokio::test]
    async fn test_exact_prompt_hits() {
        let cache = cache(10);
        cache.store("disk is full on db-1", "gpt-4o", "triage", &response("clean /var/log")).await;

        let hit = cache.check("disk is full on db-1", "gpt-4o", "triage").await.unwrap();
        assert!(hit.cached);
        assert_eq!(hit.content, "clean /var/log");
        assert_eq!(hit.tokens_used, 42);
        assert_eq!(hit.provider, "primary");
    }

    #[tokio::test]
    async fn test_near_duplicate_prompt_hits() {
        let cache = cache(10);
        cache.store("Disk is full on db-1", "gpt-4o", "triage", &response("clean logs")).await;

        assert!(cache.check("disk is FULL on db-1.", "gpt-4o", "triage").await.is_some());
    }

    #[tokio::test]
    async fn test_unrelated_prompt_misses() {
        let cache = cache(10);
        cache.store("disk is full on db-1", "gpt-4o", "triage", &response("clean logs")).await;

        assert!(cache.check("tls handshake failures after cert rotation", "gpt-4o", "triage").await.is_none());
    }

    #[tokio::test]
    async fn test_entries_are_isolated_by_model() {
        let cache = cache(10);
        cache.store("disk is full", "gpt-4o", "triage", &response("a")).await;

        assert!(cache.check("disk is full", "llama3", "triage").await.is_none());
        assert!(cache.check("disk is full", "gpt-4o", "triage").await.is_some());
    }

    #[tokio::test]
    async fn test_entries_are_isolated_by_scope() {
        let cache = cache(10);
        cache.store("disk is full", "gpt-4o", "triage", &response("triage answer")).await;

        assert!(cache.check("disk is full", "gpt-4o", "define_blast_radius").await.is_none());
        let hit = cache.check("disk is full", "gpt-4o", "triage").await.unwrap();
        assert_eq!(hit.content, "triage answer");
    }

    #[tokio::test]
    async fn test_best_match_wins() {
        let cache = cache(10);
        cache.store("disk is full on db-1 after backup", "gpt-4o", "triage", &response("older")).await;
        cache.store("disk is full on db-1", "gpt-4o", "triage", &response("exact")).await;

        let hit = cache.check("disk is full on db-1", "gpt-4o", "triage").await.unwrap();
        assert_eq!(hit.content, "exact");
    }

    // ============= Eviction Tests =============

    #[tokio::test]
    async fn test_eviction_removes_only_oldest() {
        let cache = cache(3);
        cache.store("alpha incident one", "m", "triage", &response("1")).await;
        cache.store("bravo incident two", "m", "triage", &response("2")).await;
        cache.store("charlie incident three", "m", "triage", &response("3")).await;
        assert_eq!(cache.len().await, 3);

        cache.store("delta incident four", "m", "triage", &response("4")).await;

        let contents: Vec<String> = cache.snapshot().await.into_iter().map(|e| e.content).collect();
        assert_eq!(contents, vec!["2", "3", "4"]);
        assert!(cache.check("alpha incident one", "m", "triage").await.is_none());
        assert!(cache.check("bravo incident two", "m", "triage").await.is_some());
    }

    #[tokio::test]
    async fn test_capacity_is_never_exceeded() {
        let cache = cache(5);
        for i in 0..20 {
            cache.store(&format!("prompt number {}", i), "m", "triage", &response(&i.to_string())).await;
        }
        assert_eq!(cache.len().await, 5);
        assert_eq!(cache.snapshot().await[0].content, "15");
    }

    // ============= Degradation Tests =============

    #[tokio::test]
    async fn test_unavailable_embedder_degrades_to_miss() {
        let cache = SemanticCache::new(Arc::new(UnavailableEmbedder), 10, 0.85);
        cache.store("disk is full", "gpt-4o", "triage", &response("a")).await;

        assert!(cache.is_empty().await);
        assert!(cache.check("disk is full", "gpt-4o", "triage").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_stores_respect_capacity() {
        let cache = Arc::new(cache(8));
        let mut handles = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.store(&format!("concurrent prompt {}", i), "m", "triage", &response("x")).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(cache.len().await, 8);
    }
}
