//! Application-wide constants and magic numbers
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make the engine easier to tune.

/// Investigation state machine constants
pub mod engine {
    /// Minimum confidence for a phase to advance without asking the user
    pub const ADVANCE_CONFIDENCE: f64 = 0.4;

    /// Confidence ceiling applied after a phase fails
    pub const DEGRADED_CONFIDENCE: f64 = 0.3;

    /// Upper bound on internal node visits per run/resume call
    pub const MAX_STEPS: usize = 32;

    /// Timeout for a single phase executor invocation
    pub const PHASE_TIMEOUT_SECS: u64 = 120;
}

/// Provider and router constants
pub mod provider {
    /// HTTP statuses treated as transient (retry, then fall through)
    pub const TRANSIENT_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504, 529];

    /// Exponential backoff base delay
    pub const RETRY_BASE_DELAY_MS: u64 = 500;

    /// Exponential backoff growth factor
    pub const RETRY_FACTOR: f64 = 2.0;

    /// Cap on a single backoff sleep
    pub const RETRY_MAX_DELAY_MS: u64 = 10_000;

    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_MAX_CONCURRENT: usize = 16;
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;

    /// Anthropic messages API version header
    pub const ANTHROPIC_VERSION: &str = "2023-06-01";
}

/// Semantic cache constants
pub mod cache {
    pub const DEFAULT_CAPACITY: usize = 1_000;
    pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;

    /// Width of the local hashing embedder's vectors
    pub const HASHING_DIMENSIONS: usize = 256;

    pub const EMBEDDING_TIMEOUT_MS: u64 = 2_000;
}

/// Session persistence constants
pub mod sessions {
    /// Default session TTL (24h)
    pub const DEFAULT_TTL_SECS: u64 = 86_400;

    /// Sweep expired sessions every five minutes
    pub const DEFAULT_SWEEP_CRON: &str = "0 */5 * * * *";
}

/// Default phase executor constants
pub mod agents {
    /// Confidence reported when every provider tier is exhausted
    pub const EXHAUSTED_CONFIDENCE: f64 = 0.2;

    /// How many recent findings are quoted back into a phase prompt
    pub const PROMPT_FINDINGS_WINDOW: usize = 5;
}

/// Logging event names for structured logging
pub mod events {
    pub const PHASE_COMPLETED: &str = "phase_completed";
    pub const PHASE_FAILED: &str = "phase_failed";
    pub const SESSION_SUSPENDED: &str = "session_suspended";
    pub const CONFIRMATION_REQUESTED: &str = "confirmation_requested";
    pub const CACHE_HIT: &str = "cache_hit";
    pub const TIER_FALLTHROUGH: &str = "tier_fallthrough";
    pub const PROVIDERS_EXHAUSTED: &str = "providers_exhausted";
}
