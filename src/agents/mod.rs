pub mod blast_radius;
pub mod executor;
pub mod hypothesis;
pub mod responder;
pub mod solution;
pub mod timeline;
pub mod triage;
pub mod validation;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::PhaseError;
use crate::llm::LlmRouter;
use crate::state::{AgentState, Phase, PhaseResult, UploadedData};

pub use executor::LlmPhaseExecutor;

/// Everything a phase may use besides the state itself.
#[derive(Clone)]
pub struct PhaseContext {
    pub router: Arc<LlmRouter>,
    pub uploaded_data: Vec<UploadedData>,
    pub last_user_input: Option<String>,
}

/// Performs one investigation step. The engine only relies on the returned shape.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn execute_phase(
        &self,
        phase: Phase,
        state: &AgentState,
        context: &PhaseContext,
    ) -> Result<PhaseResult, PhaseError>;
}

/// An LLM persona that drives one phase.
pub trait PhaseAgent: Send + Sync {
    fn name(&self) -> &str;
    fn system_prompt(&self) -> &str;

    /// Sampling temperature for this agent. `None` uses the router default.
    fn temperature(&self) -> Option<f32> {
        None
    }
}

/// The agent responsible for `phase`, if the phase is LLM-driven.
pub fn agent_for(phase: Phase) -> Option<&'static dyn PhaseAgent> {
    match phase {
        Phase::Triage => Some(&triage::TriageAgent),
        Phase::DefineBlastRadius => Some(&blast_radius::BlastRadiusAgent),
        Phase::EstablishTimeline => Some(&timeline::TimelineAgent),
        Phase::FormulateHypothesis => Some(&hypothesis::HypothesisAgent),
        Phase::ValidateHypothesis => Some(&validation::ValidationAgent),
        Phase::ProposeSolution => Some(&solution::SolutionAgent),
        Phase::RespondToUser => Some(&responder::ResponderAgent),
        Phase::GetUserConfirmation | Phase::AwaitUserInput | Phase::End => None,
    }
}

/// Output contract appended to every phase prompt.
pub const OUTPUT_CONTRACT: &str = r#"Rules:
- Report exactly ONE key insight and AT MOST ONE follow-up question.
- Be conservative with confidence; lower it when evidence is thin.
- Only propose an action if the user should take it now. Any action that changes
  system state (restart, config change, rollback, scaling, deletion) must be
  listed in "proposed_action" so the user can approve it first.

Output MUST be a valid JSON object with the following structure:
{
    "key_insight": "One sentence with the most important finding",
    "follow_up_question": "One clarifying question, or null",
    "confidence": 0.0 to 1.0,
    "findings": ["supporting observation", "..."],
    "recommendations": ["next step", "..."],
    "tools_used": ["tool or data source consulted"],
    "requires_user_input": true | false,
    "proposed_action": null | {
        "kind": "restart" | "config_change" | "rollback" | "scale" | "delete" | "read_only",
        "description": "What to do",
        "target": "host/service or null"
    }
}
"#;
