//! Investigation state threaded through every phase.
//!
//! `AgentState` is the single mutable record of a session. It is created on the
//! first query, mutated only by the engine's node handlers and persisted after
//! every transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Nodes of the investigation graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Triage,
    DefineBlastRadius,
    EstablishTimeline,
    FormulateHypothesis,
    ValidateHypothesis,
    ProposeSolution,
    RespondToUser,
    GetUserConfirmation,
    AwaitUserInput,
    #[serde(rename = "END")]
    End,
}

impl Phase {
    /// Substantive phases in investigation order.
    pub const SUBSTANTIVE: [Phase; 6] = [
        Phase::Triage,
        Phase::DefineBlastRadius,
        Phase::EstablishTimeline,
        Phase::FormulateHypothesis,
        Phase::ValidateHypothesis,
        Phase::ProposeSolution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Triage => "triage",
            Phase::DefineBlastRadius => "define_blast_radius",
            Phase::EstablishTimeline => "establish_timeline",
            Phase::FormulateHypothesis => "formulate_hypothesis",
            Phase::ValidateHypothesis => "validate_hypothesis",
            Phase::ProposeSolution => "propose_solution",
            Phase::RespondToUser => "respond_to_user",
            Phase::GetUserConfirmation => "get_user_confirmation",
            Phase::AwaitUserInput => "await_user_input",
            Phase::End => "END",
        }
    }

    pub fn is_substantive(&self) -> bool {
        Self::SUBSTANTIVE.contains(self)
    }

    /// The phase that follows a substantive phase. `ProposeSolution` leads to `End`.
    pub fn successor(&self) -> Option<Phase> {
        let idx = Self::SUBSTANTIVE.iter().position(|p| p == self)?;
        Some(Self::SUBSTANTIVE.get(idx + 1).copied().unwrap_or(Phase::End))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let phase = match s {
            "triage" => Phase::Triage,
            "define_blast_radius" => Phase::DefineBlastRadius,
            "establish_timeline" => Phase::EstablishTimeline,
            "formulate_hypothesis" => Phase::FormulateHypothesis,
            "validate_hypothesis" => Phase::ValidateHypothesis,
            "propose_solution" => Phase::ProposeSolution,
            "respond_to_user" => Phase::RespondToUser,
            "get_user_confirmation" => Phase::GetUserConfirmation,
            "await_user_input" => Phase::AwaitUserInput,
            "END" | "end" => Phase::End,
            other => return Err(format!("unknown phase '{}'", other)),
        };
        Ok(phase)
    }
}

/// Where the investigation stands: inside a phase, or just past one.
///
/// Serialized as the phase name, with a `_completed` suffix once the phase has
/// produced its result (`"triage"` vs `"triage_completed"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseCursor {
    At(Phase),
    Completed(Phase),
}

impl PhaseCursor {
    pub fn phase(&self) -> Phase {
        match self {
            PhaseCursor::At(p) | PhaseCursor::Completed(p) => *p,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PhaseCursor::Completed(_))
    }

    /// Phase implied by the `_completed` suffix, if any.
    pub fn next_phase(&self) -> Option<Phase> {
        match self {
            PhaseCursor::Completed(p) => p.successor(),
            PhaseCursor::At(_) => None,
        }
    }
}

impl fmt::Display for PhaseCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseCursor::At(p) => write!(f, "{}", p),
            PhaseCursor::Completed(p) => write!(f, "{}_completed", p),
        }
    }
}

impl FromStr for PhaseCursor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_suffix("_completed") {
            Some(base) => Ok(PhaseCursor::Completed(base.parse()?)),
            None => Ok(PhaseCursor::At(s.parse()?)),
        }
    }
}

impl Serialize for PhaseCursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PhaseCursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One entry of the append-only audit trail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    pub finding: String,
    #[serde(default)]
    pub details: Value,
    pub requires_user_response: bool,
}

/// Reference to data the user uploaded alongside the query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedData {
    pub reference: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Restart,
    ConfigChange,
    Rollback,
    Scale,
    Delete,
    ReadOnly,
}

impl ActionKind {
    /// Whether executing this action mutates the user's systems.
    pub fn is_state_changing(&self) -> bool {
        !matches!(self, ActionKind::ReadOnly)
    }
}

/// An action a phase wants the user to carry out (or approve).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub kind: ActionKind,
    pub description: String,
    #[serde(default)]
    pub target: Option<String>,
}

impl ProposedAction {
    pub fn requires_confirmation(&self) -> bool {
        self.kind.is_state_changing()
    }
}

/// Structured output of one phase executor invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub key_insight: String,
    #[serde(default)]
    pub follow_up_question: Option<String>,
    pub confidence_score: f64,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub requires_user_input: bool,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub proposed_action: Option<ProposedAction>,
}

/// Auxiliary per-session fields. The core set is typed; anything a phase wants
/// to attach beyond that goes into `extensions`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestigationContext {
    #[serde(default)]
    pub last_response: Option<String>,
    #[serde(default)]
    pub last_user_input: Option<String>,
    #[serde(default)]
    pub waiting_for_input: bool,
    #[serde(default)]
    pub interaction_count: u32,
    #[serde(default)]
    pub uploaded_data: Vec<UploadedData>,
    /// Set when the next `respond_to_user` must answer the latest user input.
    #[serde(default)]
    pub reply_pending: bool,
    #[serde(default)]
    pub pending_confirmation: Option<ProposedAction>,
    #[serde(default)]
    pub approved_actions: Vec<ProposedAction>,
    /// Latest result per phase, keyed by phase name.
    #[serde(default)]
    pub phase_results: BTreeMap<String, PhaseResult>,
    /// Errors keyed `<phase>_error`.
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
    #[serde(default)]
    pub extensions: Map<String, Value>,
}

impl InvestigationContext {
    pub fn error_key(phase: Phase) -> String {
        format!("{}_error", phase)
    }

    pub fn record_error(&mut self, phase: Phase, message: impl Into<String>) {
        self.errors.insert(Self::error_key(phase), message.into());
    }

    pub fn phase_result(&self, phase: Phase) -> Option<&PhaseResult> {
        self.phase_results.get(phase.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub session_id: String,
    pub user_query: String,
    pub current_phase: PhaseCursor,
    #[serde(default)]
    pub investigation_context: InvestigationContext,
    #[serde(default)]
    findings: Vec<Finding>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    tools_used: Vec<String>,
    pub confidence_score: f64,
}

impl AgentState {
    pub fn new(session_id: impl Into<String>, user_query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_query: user_query.into(),
            current_phase: PhaseCursor::At(Phase::Triage),
            investigation_context: InvestigationContext::default(),
            findings: Vec::new(),
            recommendations: Vec::new(),
            tools_used: Vec::new(),
            confidence_score: 0.0,
        }
    }

    /// Start a new query on an existing session. The audit trail is kept.
    pub fn begin_turn(&mut self, user_query: impl Into<String>) {
        self.user_query = user_query.into();
        self.current_phase = PhaseCursor::At(Phase::Triage);
        self.confidence_score = 0.0;
        let ctx = &mut self.investigation_context;
        ctx.waiting_for_input = false;
        ctx.reply_pending = false;
        ctx.pending_confirmation = None;
        ctx.last_response = None;
    }

    // Findings, recommendations and tools are append-only; no mutable access.

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn tools_used(&self) -> &[String] {
        &self.tools_used
    }

    pub fn latest_finding(&self) -> Option<&Finding> {
        self.findings.last()
    }

    pub fn push_finding(
        &mut self,
        phase: Phase,
        finding: impl Into<String>,
        details: Value,
        requires_user_response: bool,
    ) {
        self.findings.push(Finding {
            timestamp: Utc::now(),
            phase,
            finding: finding.into(),
            details,
            requires_user_response,
        });
    }

    pub fn push_recommendations<I: IntoIterator<Item = String>>(&mut self, items: I) {
        self.recommendations.extend(items);
    }

    /// Records tools, skipping ones already listed.
    pub fn push_tools<I: IntoIterator<Item = String>>(&mut self, items: I) {
        for tool in items {
            if !self.tools_used.contains(&tool) {
                self.tools_used.push(tool);
            }
        }
    }

    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence_score = confidence.clamp(0.0, 1.0);
    }

    pub fn is_waiting_for_input(&self) -> bool {
        self.investigation_context.waiting_for_input
    }

    pub fn is_finished(&self) -> bool {
        self.current_phase == PhaseCursor::At(Phase::End)
    }
}
