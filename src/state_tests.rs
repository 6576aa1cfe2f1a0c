//! Unit tests for the investigation state record.

#[cfg(test)]
mod state_tests {
    use crate::state::*;
    use serde_json::json;

    // ============= Phase Tests =============

    #[test]
    fn test_successor_walks_substantive_phases() {
        assert_eq!(Phase::Triage.successor(), Some(Phase::DefineBlastRadius));
        assert_eq!(Phase::DefineBlastRadius.successor(), Some(Phase::EstablishTimeline));
        assert_eq!(Phase::ValidateHypothesis.successor(), Some(Phase::ProposeSolution));
        assert_eq!(Phase::ProposeSolution.successor(), Some(Phase::End));
    }

    #[test]
    fn test_successor_of_control_nodes_is_none() {
        assert_eq!(Phase::RespondToUser.successor(), None);
        assert_eq!(Phase::AwaitUserInput.successor(), None);
        assert_eq!(Phase::End.successor(), None);
    }

    #[test]
    fn test_phase_name_round_trip() {
        for phase in Phase::SUBSTANTIVE {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert_eq!("END".parse::<Phase>().unwrap(), Phase::End);
        assert!("investigate".parse::<Phase>().is_err());
    }

    #[test]
    fn test_phase_serde_matches_display() {
        let encoded = serde_json::to_value(Phase::DefineBlastRadius).unwrap();
        assert_eq!(encoded, json!("define_blast_radius"));
        assert_eq!(serde_json::to_value(Phase::End).unwrap(), json!("END"));
    }

    // ============= PhaseCursor Tests =============

    #[test]
    fn test_cursor_completed_suffix() {
        let cursor = PhaseCursor::Completed(Phase::Triage);
        assert_eq!(cursor.to_string(), "triage_completed");
        assert_eq!(cursor.next_phase(), Some(Phase::DefineBlastRadius));

        let parsed: PhaseCursor = "establish_timeline_completed".parse().unwrap();
        assert_eq!(parsed, PhaseCursor::Completed(Phase::EstablishTimeline));
    }

    #[test]
    fn test_cursor_in_progress_has_no_next_phase() {
        let cursor: PhaseCursor = "triage".parse().unwrap();
        assert_eq!(cursor, PhaseCursor::At(Phase::Triage));
        assert!(!cursor.is_completed());
        assert_eq!(cursor.next_phase(), None);
    }

    #[test]
    fn test_cursor_serializes_as_string() {
        let value = serde_json::to_value(PhaseCursor::Completed(Phase::ProposeSolution)).unwrap();
        assert_eq!(value, json!("propose_solution_completed"));

        let back: PhaseCursor = serde_json::from_value(json!("END")).unwrap();
        assert_eq!(back, PhaseCursor::At(Phase::End));
    }

    // ============= AgentState Tests =============

    #[test]
    fn test_new_state_starts_at_triage() {
        let state = AgentState::new("s-1", "disk is full");
        assert_eq!(state.current_phase, PhaseCursor::At(Phase::Triage));
        assert!(state.findings().is_empty());
        assert_eq!(state.confidence_score, 0.0);
        assert!(!state.is_waiting_for_input());
    }

    #[test]
    fn test_findings_append_in_order() {
        let mut state = AgentState::new("s-1", "disk is full");
        state.push_finding(Phase::Triage, "first", json!({}), true);
        state.push_finding(Phase::DefineBlastRadius, "second", json!({"hosts": 3}), false);

        assert_eq!(state.findings().len(), 2);
        assert_eq!(state.findings()[0].finding, "first");
        assert_eq!(state.latest_finding().unwrap().phase, Phase::DefineBlastRadius);
        assert!(state.findings()[0].timestamp <= state.findings()[1].timestamp);
    }

    #[test]
    fn test_tools_are_deduplicated() {
        let mut state = AgentState::new("s-1", "q");
        state.push_tools(vec!["log_search".to_string(), "df".to_string()]);
        state.push_tools(vec!["df".to_string()]);
        assert_eq!(state.tools_used(), &["log_search".to_string(), "df".to_string()]);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let mut state = AgentState::new("s-1", "q");
        state.set_confidence(1.7);
        assert_eq!(state.confidence_score, 1.0);
        state.set_confidence(-0.2);
        assert_eq!(state.confidence_score, 0.0);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = AgentState::new("s-9", "api latency spike");
        state.current_phase = PhaseCursor::Completed(Phase::Triage);
        state.push_finding(Phase::Triage, "Initial assessment", json!({"severity": "medium"}), true);
        state.investigation_context.waiting_for_input = true;
        state
            .investigation_context
            .extensions
            .insert("runbook".to_string(), json!("rb-12"));

        let encoded = serde_json::to_string(&state).unwrap();
        assert!(encoded.contains("\"triage_completed\""));
        let decoded: AgentState = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_error_key_is_phase_specific() {
        let mut ctx = InvestigationContext::default();
        ctx.record_error(Phase::EstablishTimeline, "boom");
        assert_eq!(ctx.errors.get("establish_timeline_error").unwrap(), "boom");
    }

    #[test]
    fn test_read_only_actions_need_no_confirmation() {
        let read = ProposedAction {
            kind: ActionKind::ReadOnly,
            description: "inspect logs".to_string(),
            target: None,
        };
        let restart = ProposedAction {
            kind: ActionKind::Restart,
            description: "restart nginx".to_string(),
            target: Some("web-1".to_string()),
        };
        assert!(!read.requires_confirmation());
        assert!(restart.requires_confirmation());
    }
}
