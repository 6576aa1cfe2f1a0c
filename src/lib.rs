//! Troubleshoot - AI troubleshooting agent
//!
//! This library provides a phase-driven investigation engine, a tiered LLM
//! router with retry and confidence fallback, and a semantic response cache.

pub mod agents;
pub mod api;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod llm;
pub mod sanitize;
pub mod state;

// Re-export commonly used types
pub use config::AppConfig;
pub use engine::{InMemorySessionStore, InvestigationEngine, SessionStore};
pub use llm::{LlmResponse, LlmRouter, RouteRequest, SemanticCache};
pub use state::{AgentState, Phase, PhaseCursor, PhaseResult};

#[cfg(test)]
mod state_tests;
