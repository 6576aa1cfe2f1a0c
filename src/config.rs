use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::constants::{cache, engine, provider, sessions};
use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr() }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_advance_confidence")]
    pub advance_confidence: f64,
    #[serde(default = "default_degraded_confidence")]
    pub degraded_confidence: f64,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_phase_timeout_secs")]
    pub phase_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            advance_confidence: default_advance_confidence(),
            degraded_confidence: default_degraded_confidence(),
            max_steps: default_max_steps(),
            phase_timeout_secs: default_phase_timeout_secs(),
        }
    }
}

impl EngineConfig {
    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_base_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_retry_factor")]
    pub factor: f64,
    #[serde(default = "default_retry_max_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_retry_base_ms(),
            factor: default_retry_factor(),
            max_delay_ms: default_retry_max_ms(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Model requested by the phase agents (also the cache key).
    pub default_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,
    /// Used by every phase agent that does not set its own temperature.
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            default_model: None,
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbeddingConfig {
    /// Deterministic local feature-hashing embedder
    Hashing {
        #[serde(default = "default_hashing_dimensions")]
        dimensions: usize,
    },
    /// Ollama-compatible `/api/embeddings` endpoint
    Ollama {
        base_url: String,
        model: String,
        #[serde(default = "default_embedding_timeout_ms")]
        timeout_ms: u64,
    },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::Hashing { dimensions: default_hashing_dimensions() }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            similarity_threshold: default_similarity_threshold(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            sweep_cron: default_sweep_cron(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Any OpenAI-compatible chat completions endpoint
    Openai,
    Anthropic,
    Ollama,
}

/// One tier of the router's fallback chain. Immutable after startup.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderTier {
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub models: Vec<String>,
    /// Environment variable holding the credential. `None` means no credential needed.
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Confidence the router assigns to every response from this tier
    pub confidence: f64,
    /// Gate applied when the caller does not pass a threshold
    pub min_confidence: f64,
}

impl ProviderTier {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Model to send: the requested one if this tier serves it, else the tier default.
    pub fn resolve_model(&self, requested: Option<&str>) -> Option<String> {
        match requested {
            Some(m) if self.models.iter().any(|x| x == m) => Some(m.to_string()),
            _ => self.models.first().cloned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    pub tiers: Vec<ProviderTier>,
}

impl AppConfig {
    /// Load from `CONFIG_PATH` (default `config.yaml`).
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // Strip BOM if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiers.is_empty() {
            return Err(ConfigError::Invalid("at least one provider tier is required".into()));
        }
        for tier in &self.tiers {
            if tier.models.is_empty() {
                return Err(ConfigError::Invalid(format!("tier '{}' lists no models", tier.name)));
            }
            if tier.max_attempts == 0 {
                return Err(ConfigError::Invalid(format!("tier '{}' has max_attempts = 0", tier.name)));
            }
            if !in_unit_range(tier.confidence) || !in_unit_range(tier.min_confidence) {
                return Err(ConfigError::Invalid(format!(
                    "tier '{}' confidence values must lie in [0, 1]",
                    tier.name
                )));
            }
        }
        if !in_unit_range(self.engine.advance_confidence) || !in_unit_range(self.engine.degraded_confidence) {
            return Err(ConfigError::Invalid("engine confidence values must lie in [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(ConfigError::Invalid("cache.similarity_threshold must lie in [0, 1]".into()));
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid("cache.capacity must be positive".into()));
        }
        if self.router.retry.factor < 1.0 {
            return Err(ConfigError::Invalid("router.retry.factor must be >= 1.0".into()));
        }
        Ok(())
    }
}

fn in_unit_range(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}
fn default_advance_confidence() -> f64 {
    engine::ADVANCE_CONFIDENCE
}
fn default_degraded_confidence() -> f64 {
    engine::DEGRADED_CONFIDENCE
}
fn default_max_steps() -> usize {
    engine::MAX_STEPS
}
fn default_phase_timeout_secs() -> u64 {
    engine::PHASE_TIMEOUT_SECS
}
fn default_retry_base_ms() -> u64 {
    provider::RETRY_BASE_DELAY_MS
}
fn default_retry_factor() -> f64 {
    provider::RETRY_FACTOR
}
fn default_retry_max_ms() -> u64 {
    provider::RETRY_MAX_DELAY_MS
}
fn default_max_concurrent() -> usize {
    provider::DEFAULT_MAX_CONCURRENT
}
fn default_max_tokens() -> u32 {
    provider::DEFAULT_MAX_TOKENS
}
fn default_temperature() -> f32 {
    provider::DEFAULT_TEMPERATURE
}
fn default_max_attempts() -> u32 {
    provider::DEFAULT_MAX_ATTEMPTS
}
fn default_timeout_secs() -> u64 {
    provider::DEFAULT_TIMEOUT_SECS
}
fn default_true() -> bool {
    true
}
fn default_cache_capacity() -> usize {
    cache::DEFAULT_CAPACITY
}
fn default_similarity_threshold() -> f32 {
    cache::DEFAULT_SIMILARITY_THRESHOLD
}
fn default_hashing_dimensions() -> usize {
    cache::HASHING_DIMENSIONS
}
fn default_embedding_timeout_ms() -> u64 {
    cache::EMBEDDING_TIMEOUT_MS
}
fn default_session_ttl_secs() -> u64 {
    sessions::DEFAULT_TTL_SECS
}
fn default_sweep_cron() -> String {
    sessions::DEFAULT_SWEEP_CRON.to_string()
}
