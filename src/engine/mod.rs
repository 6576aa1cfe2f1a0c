//! Investigation engine: the phase graph, its transition rules and session persistence.

pub mod intent;
pub mod machine;
pub mod store;
pub mod transitions;

pub use machine::InvestigationEngine;
pub use store::{InMemorySessionStore, SessionStore};
pub use transitions::{Condition, ResumeDecision, TransitionTable};

#[cfg(test)]
mod store_tests;
