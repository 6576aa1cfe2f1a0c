//! Pure transition logic for the investigation graph.
//!
//! Static edges live in a `Phase -> Condition -> Phase` table. Which condition
//! applies after a phase, and where a resumed session re-enters, are decided by
//! the pure functions below; the machine only executes the result.

use std::collections::HashMap;

use super::intent;
use crate::state::{AgentState, Phase, PhaseCursor};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Interruption rule satisfied: go straight to the next phase
    Advance,
    /// Detour through `respond_to_user`
    NeedsUserResponse,
    /// Result carries a state-changing action
    NeedsConfirmation,
    /// Hand control back to the caller
    Suspend,
}

pub struct TransitionTable {
    edges: HashMap<Phase, HashMap<Condition, Phase>>,
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TransitionTable {
    pub fn standard() -> Self {
        let mut edges: HashMap<Phase, HashMap<Condition, Phase>> = HashMap::new();

        for phase in Phase::SUBSTANTIVE {
            let mut out = HashMap::new();
            if let Some(next) = phase.successor() {
                out.insert(Condition::Advance, next);
            }
            out.insert(Condition::NeedsUserResponse, Phase::RespondToUser);
            out.insert(Condition::NeedsConfirmation, Phase::GetUserConfirmation);
            edges.insert(phase, out);
        }

        edges.insert(
            Phase::RespondToUser,
            HashMap::from([(Condition::Suspend, Phase::AwaitUserInput)]),
        );
        edges.insert(
            Phase::GetUserConfirmation,
            HashMap::from([(Condition::Suspend, Phase::AwaitUserInput)]),
        );

        Self { edges }
    }

    pub fn next(&self, from: Phase, condition: Condition) -> Option<Phase> {
        self.edges.get(&from)?.get(&condition).copied()
    }
}

/// The facts about a just-finished phase that the interruption rule inspects.
#[derive(Clone, Copy, Debug)]
pub struct PhaseOutcome {
    pub waiting_for_input: bool,
    pub confidence: f64,
    pub latest_requires_response: bool,
    pub needs_confirmation: bool,
}

impl PhaseOutcome {
    pub fn from_state(state: &AgentState, needs_confirmation: bool) -> Self {
        Self {
            waiting_for_input: state.investigation_context.waiting_for_input,
            confidence: state.confidence_score,
            latest_requires_response: state
                .latest_finding()
                .map(|f| f.requires_user_response)
                .unwrap_or(false),
            needs_confirmation,
        }
    }
}

/// "Single Insight, Single Question": advance only when nothing needs the user.
pub fn classify(outcome: &PhaseOutcome, advance_confidence: f64) -> Condition {
    if outcome.needs_confirmation {
        return Condition::NeedsConfirmation;
    }
    if !outcome.waiting_for_input && outcome.confidence >= advance_confidence && !outcome.latest_requires_response {
        Condition::Advance
    } else {
        Condition::NeedsUserResponse
    }
}

/// Where a resumed session re-enters the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Pending action approved; continue at the given phase
    Confirmed(Phase),
    /// Pending action not approved; stay suspended
    Declined,
    /// Continuation intent; run the phase implied by the `_completed` marker
    Continue(Phase),
    /// New information; answer it through `respond_to_user`
    Reply,
    /// The phase never completed; run it again with the new input
    Retry(Phase),
}

pub fn evaluate_resume(state: &AgentState, input: &str) -> ResumeDecision {
    let cursor = state.current_phase;

    if state.investigation_context.pending_confirmation.is_some() {
        if intent::is_affirmative(input) {
            return ResumeDecision::Confirmed(cursor.next_phase().unwrap_or(Phase::End));
        }
        return ResumeDecision::Declined;
    }

    match cursor {
        PhaseCursor::Completed(_) => match cursor.next_phase() {
            Some(next) if intent::is_continuation(input) => ResumeDecision::Continue(next),
            _ => ResumeDecision::Reply,
        },
        PhaseCursor::At(phase) if phase.is_substantive() => ResumeDecision::Retry(phase),
        PhaseCursor::At(_) => ResumeDecision::Reply,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ActionKind, ProposedAction};
    use serde_json::json;

    fn outcome(waiting: bool, confidence: f64, requires: bool) -> PhaseOutcome {
        PhaseOutcome {
            waiting_for_input: waiting,
            confidence,
            latest_requires_response: requires,
            needs_confirmation: false,
        }
    }

    // ============= Table Tests =============

    #[test]
    fn test_advance_edges_follow_phase_order() {
        let t = TransitionTable::standard();
        assert_eq!(t.next(Phase::Triage, Condition::Advance), Some(Phase::DefineBlastRadius));
        assert_eq!(t.next(Phase::ProposeSolution, Condition::Advance), Some(Phase::End));
    }

    #[test]
    fn test_every_substantive_phase_can_detour() {
        let t = TransitionTable::standard();
        for phase in Phase::SUBSTANTIVE {
            assert_eq!(t.next(phase, Condition::NeedsUserResponse), Some(Phase::RespondToUser));
            assert_eq!(t.next(phase, Condition::NeedsConfirmation), Some(Phase::GetUserConfirmation));
        }
    }

    #[test]
    fn test_control_nodes_suspend() {
        let t = TransitionTable::standard();
        assert_eq!(t.next(Phase::RespondToUser, Condition::Suspend), Some(Phase::AwaitUserInput));
        assert_eq!(t.next(Phase::GetUserConfirmation, Condition::Suspend), Some(Phase::AwaitUserInput));
        assert_eq!(t.next(Phase::AwaitUserInput, Condition::Advance), None);
        assert_eq!(t.next(Phase::End, Condition::Advance), None);
    }

    #[test]
    fn test_table_has_no_cycles_without_user_input() {
        // Following Advance edges from triage must terminate.
        let t = TransitionTable::standard();
        let mut node = Phase::Triage;
        let mut steps = 0;
        while let Some(next) = t.next(node, Condition::Advance) {
            node = next;
            steps += 1;
            assert!(steps <= Phase::SUBSTANTIVE.len());
        }
        assert_eq!(node, Phase::End);
    }

    // ============= Interruption Rule Tests =============

    #[test]
    fn test_all_three_conditions_allow_advance() {
        assert_eq!(classify(&outcome(false, 0.4, false), 0.4), Condition::Advance);
        assert_eq!(classify(&outcome(false, 0.95, false), 0.4), Condition::Advance);
    }

    #[test]
    fn test_any_failed_condition_detours() {
        assert_eq!(classify(&outcome(true, 0.9, false), 0.4), Condition::NeedsUserResponse);
        assert_eq!(classify(&outcome(false, 0.39, false), 0.4), Condition::NeedsUserResponse);
        assert_eq!(classify(&outcome(false, 0.9, true), 0.4), Condition::NeedsUserResponse);
    }

    #[test]
    fn test_confirmation_takes_precedence() {
        let mut o = outcome(false, 0.9, false);
        o.needs_confirmation = true;
        assert_eq!(classify(&o, 0.4), Condition::NeedsConfirmation);
    }

    // ============= Resume Tests =============

    fn completed_state(phase: Phase) -> AgentState {
        let mut s = AgentState::new("s", "disk is full");
        s.current_phase = PhaseCursor::Completed(phase);
        s.push_finding(phase, "insight", json!({}), true);
        s
    }

    #[test]
    fn test_continuation_moves_to_successor() {
        let s = completed_state(Phase::Triage);
        assert_eq!(evaluate_resume(&s, "yes, continue"), ResumeDecision::Continue(Phase::DefineBlastRadius));
    }

    #[test]
    fn test_new_information_replies() {
        let s = completed_state(Phase::Triage);
        assert_eq!(evaluate_resume(&s, "only the primary db"), ResumeDecision::Reply);
    }

    #[test]
    fn test_continuation_after_solution_ends() {
        let s = completed_state(Phase::ProposeSolution);
        assert_eq!(evaluate_resume(&s, "continue"), ResumeDecision::Continue(Phase::End));
    }

    #[test]
    fn test_failed_phase_is_retried() {
        let mut s = AgentState::new("s", "q");
        s.current_phase = PhaseCursor::At(Phase::EstablishTimeline);
        assert_eq!(evaluate_resume(&s, "it started at 2am"), ResumeDecision::Retry(Phase::EstablishTimeline));
    }

    #[test]
    fn test_ended_session_replies() {
        let mut s = AgentState::new("s", "q");
        s.current_phase = PhaseCursor::At(Phase::End);
        assert_eq!(evaluate_resume(&s, "continue"), ResumeDecision::Reply);
    }

    #[test]
    fn test_pending_confirmation_requires_affirmative() {
        let mut s = completed_state(Phase::ProposeSolution);
        s.investigation_context.pending_confirmation = Some(ProposedAction {
            kind: ActionKind::Restart,
            description: "restart postgres".to_string(),
            target: None,
        });

        assert_eq!(evaluate_resume(&s, "what does that do?"), ResumeDecision::Declined);
        assert_eq!(evaluate_resume(&s, "no"), ResumeDecision::Declined);
        assert_eq!(evaluate_resume(&s, "yes"), ResumeDecision::Confirmed(Phase::End));
    }
}
