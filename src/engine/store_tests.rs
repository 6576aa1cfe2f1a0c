//! Unit tests for InMemorySessionStore - save/load fidelity and TTL expiry.

#[cfg(test)]
mod store_tests {
    use crate::engine::store::{InMemorySessionStore, SessionStore};
    use crate::state::{AgentState, Phase, PhaseCursor};
    use serde_json::json;
    use std::time::Duration;

    fn sample_state(id: &str) -> AgentState {
        let mut state = AgentState::new(id, "disk is full");
        state.current_phase = PhaseCursor::Completed(Phase::Triage);
        state.push_finding(Phase::Triage, "Initial assessment: medium severity", json!({"disk": "/var"}), true);
        state.set_confidence(0.6);
        state.investigation_context.waiting_for_input = true;
        state
    }

    #[tokio::test]
    async fn test_save_then_load_is_verbatim() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));
        let state = sample_state("s-1");

        store.save(&state).await.unwrap();
        let loaded = store.load("s-1").await.unwrap().unwrap();

        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_unknown_session_is_absent() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_state() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));
        let mut state = sample_state("s-1");
        store.save(&state).await.unwrap();

        state.current_phase = PhaseCursor::Completed(Phase::DefineBlastRadius);
        store.save(&state).await.unwrap();

        let loaded = store.load("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.current_phase, PhaseCursor::Completed(Phase::DefineBlastRadius));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_is_absent_and_removed() {
        let store = InMemorySessionStore::new(Duration::from_millis(20));
        store.save(&sample_state("s-1")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.load("s-1").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_purge_only_removes_expired() {
        let store = InMemorySessionStore::new(Duration::from_millis(30));
        store.save(&sample_state("old")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.save(&sample_state("fresh")).await.unwrap();

        assert_eq!(store.purge_expired(), 1);
        assert!(store.load("fresh").await.unwrap().is_some());
        assert!(store.load("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));
        store.save(&sample_state("s-1")).await.unwrap();
        store.delete("s-1").await.unwrap();
        assert!(store.load("s-1").await.unwrap().is_none());
    }
}
