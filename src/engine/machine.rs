//! The investigation state machine.
//!
//! `run` and `resume` walk the graph one node at a time, strictly in order,
//! persisting after every transition. The walk stops at `await_user_input` or
//! `END`. A phase failure never escapes: it is recorded, confidence is capped
//! and the user is asked for more information.

use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::store::SessionStore;
use super::transitions::{classify, evaluate_resume, Condition, PhaseOutcome, ResumeDecision, TransitionTable};
use crate::agents::{PhaseContext, PhaseExecutor};
use crate::config::EngineConfig;
use crate::constants::events;
use crate::error::{EngineError, PhaseError};
use crate::llm::LlmRouter;
use crate::state::{AgentState, InvestigationContext, Phase, PhaseCursor, PhaseResult, UploadedData};

const DEGRADED_QUESTION: &str =
    "Could you share more details about the issue, such as error messages, affected systems or when it started?";

pub struct InvestigationEngine {
    executor: Arc<dyn PhaseExecutor>,
    router: Arc<LlmRouter>,
    store: Arc<dyn SessionStore>,
    config: EngineConfig,
    table: TransitionTable,
    session_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InvestigationEngine {
    pub fn new(
        executor: Arc<dyn PhaseExecutor>,
        router: Arc<LlmRouter>,
        store: Arc<dyn SessionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            executor,
            router,
            store,
            config,
            table: TransitionTable::standard(),
            session_locks: DashMap::new(),
        }
    }

    /// Start (or restart) an investigation for `session_id`.
    pub async fn run(
        &self,
        session_id: &str,
        user_query: &str,
        uploaded_data: Vec<UploadedData>,
    ) -> Result<AgentState, EngineError> {
        if session_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("session_id is empty".to_string()));
        }
        if user_query.trim().is_empty() {
            return Err(EngineError::InvalidInput("query is empty".to_string()));
        }

        let lock = self.session_lock(session_id);
        let result = {
            let _guard = lock.lock().await;
            self.run_locked(session_id, user_query.trim(), uploaded_data).await
        };
        self.release_session_lock(session_id, lock);
        result
    }

    async fn run_locked(
        &self,
        session_id: &str,
        user_query: &str,
        uploaded_data: Vec<UploadedData>,
    ) -> Result<AgentState, EngineError> {
        let mut state = match self.store.load(session_id).await? {
            Some(mut existing) => {
                info!("🔎 [ENGINE] New query on existing session {}", session_id);
                existing.begin_turn(user_query);
                existing
            }
            None => {
                info!("🔎 [ENGINE] New investigation {}", session_id);
                AgentState::new(session_id, user_query)
            }
        };
        state.investigation_context.uploaded_data.extend(uploaded_data);
        self.store.save(&state).await?;

        self.walk(&mut state, Phase::Triage).await?;
        Ok(state)
    }

    /// Continue a suspended investigation with the user's reply.
    pub async fn resume(&self, session_id: &str, user_input: &str) -> Result<AgentState, EngineError> {
        let input = user_input.trim();
        if input.is_empty() {
            return Err(EngineError::InvalidInput("input is empty".to_string()));
        }

        // Unknown or expired sessions fail fast; nothing is created implicitly.
        if self.store.load(session_id).await?.is_none() {
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }

        let lock = self.session_lock(session_id);
        let result = {
            let _guard = lock.lock().await;
            self.resume_locked(session_id, input).await
        };
        self.release_session_lock(session_id, lock);
        result
    }

    async fn resume_locked(&self, session_id: &str, input: &str) -> Result<AgentState, EngineError> {
        // Reloaded under the lock; the session may have expired meanwhile.
        let mut state = self
            .store
            .load(session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;

        {
            let ctx = &mut state.investigation_context;
            ctx.last_user_input = Some(input.to_string());
            ctx.waiting_for_input = false;
            ctx.interaction_count += 1;
        }

        let decision = evaluate_resume(&state, input);
        info!("🔎 [ENGINE] Resume {} at {} -> {:?}", session_id, state.current_phase, decision);

        let start = match decision {
            ResumeDecision::Confirmed(next) => {
                let ctx = &mut state.investigation_context;
                if let Some(action) = ctx.pending_confirmation.take() {
                    info!("✅ [ENGINE] User approved action: {}", action.description);
                    ctx.approved_actions.push(action);
                }
                next
            }
            ResumeDecision::Declined => {
                let ctx = &mut state.investigation_context;
                let description = ctx
                    .pending_confirmation
                    .as_ref()
                    .map(|a| a.description.clone())
                    .unwrap_or_default();
                ctx.last_response = Some(format!(
                    "Understood, I won't proceed with \"{}\" yet. Reply \"yes\" when you want to go ahead, or tell me what you'd like to do instead.",
                    description
                ));
                Phase::AwaitUserInput
            }
            ResumeDecision::Continue(next) => next,
            ResumeDecision::Reply => {
                state.investigation_context.reply_pending = true;
                Phase::RespondToUser
            }
            ResumeDecision::Retry(phase) => phase,
        };

        self.walk(&mut state, start).await?;
        Ok(state)
    }

    /// Current persisted state, if the session exists.
    pub async fn get_state(&self, session_id: &str) -> Result<Option<AgentState>, EngineError> {
        Ok(self.store.load(session_id).await?)
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no other call holds or waits on it.
    fn release_session_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.session_locks
            .remove_if(session_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of sessions with a call in flight.
    pub fn active_session_locks(&self) -> usize {
        self.session_locks.len()
    }

    async fn walk(&self, state: &mut AgentState, start: Phase) -> Result<(), EngineError> {
        let mut node = start;

        for step in 0..self.config.max_steps {
            debug!("[ENGINE] {} step {} at {}", state.session_id, step, node);
            let next = match node {
                Phase::AwaitUserInput => {
                    self.suspend(state).await?;
                    return Ok(());
                }
                Phase::End => {
                    self.finish(state).await?;
                    return Ok(());
                }
                Phase::RespondToUser => self.respond_to_user(state).await,
                Phase::GetUserConfirmation => self.request_confirmation(state),
                phase => self.run_phase(state, phase).await,
            };
            self.store.save(state).await?;
            node = next;
        }

        warn!(
            "⚠️ [ENGINE] {} hit the step limit ({}), suspending",
            state.session_id, self.config.max_steps
        );
        self.suspend(state).await
    }

    fn phase_context(&self, state: &AgentState) -> PhaseContext {
        PhaseContext {
            router: self.router.clone(),
            uploaded_data: state.investigation_context.uploaded_data.clone(),
            last_user_input: state.investigation_context.last_user_input.clone(),
        }
    }

    async fn execute(&self, phase: Phase, state: &AgentState) -> Result<PhaseResult, PhaseError> {
        let context = self.phase_context(state);
        let timeout = self.config.phase_timeout();
        match tokio::time::timeout(timeout, self.executor.execute_phase(phase, state, &context)).await {
            Ok(result) => result,
            Err(_) => Err(PhaseError::TimedOut {
                phase: phase.to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn run_phase(&self, state: &mut AgentState, phase: Phase) -> Phase {
        state.current_phase = PhaseCursor::At(phase);
        state.investigation_context.waiting_for_input = false;
        info!("🔎 [ENGINE] {} entering {}", state.session_id, phase);

        match self.execute(phase, state).await {
            Ok(result) => self.apply_result(state, phase, result),
            Err(e) => self.degrade(state, phase, &e),
        }
    }

    /// Record a successful phase and pick the next node.
    fn apply_result(&self, state: &mut AgentState, phase: Phase, result: PhaseResult) -> Phase {
        let requires_response = result.follow_up_question.is_some() || result.requires_user_input;
        let details = json!({
            "findings": result.findings,
            "follow_up_question": result.follow_up_question,
            "proposed_action": result.proposed_action,
        });

        // Exactly one finding per phase, whatever the executor returned.
        state.push_finding(phase, result.key_insight.clone(), details, requires_response);
        state.push_recommendations(result.recommendations.iter().cloned());
        state.push_tools(result.tools_used.iter().cloned());
        state.set_confidence(result.confidence_score);

        let gated_action = result.proposed_action.clone().filter(|a| a.requires_confirmation());
        let ctx = &mut state.investigation_context;
        ctx.last_response = Some(compose_response(&result.key_insight, result.follow_up_question.as_deref()));
        if result.requires_user_input {
            ctx.waiting_for_input = true;
        }
        ctx.errors.remove(&InvestigationContext::error_key(phase));
        ctx.phase_results.insert(phase.as_str().to_string(), result);
        let needs_confirmation = gated_action.is_some();
        if gated_action.is_some() {
            ctx.pending_confirmation = gated_action;
        }
        state.current_phase = PhaseCursor::Completed(phase);

        let outcome = PhaseOutcome::from_state(state, needs_confirmation);
        let condition = classify(&outcome, self.config.advance_confidence);
        info!(
            event = events::PHASE_COMPLETED,
            "🔎 [ENGINE] {} completed {} (confidence {:.2}) -> {:?}",
            state.session_id,
            phase,
            state.confidence_score,
            condition
        );
        self.table.next(phase, condition).unwrap_or(Phase::RespondToUser)
    }

    /// Convert a phase failure into an apology plus a clarifying question.
    fn degrade(&self, state: &mut AgentState, phase: Phase, err: &PhaseError) -> Phase {
        error!(event = events::PHASE_FAILED, "❌ [ENGINE] {} phase {} failed: {}", state.session_id, phase, err);

        let apology = format!("I'm sorry, I ran into a problem while working on the {} step.", phase_label(phase));
        state.push_finding(phase, apology.clone(), json!({ "error": err.to_string() }), true);
        state.set_confidence(state.confidence_score.min(self.config.degraded_confidence));

        let ctx = &mut state.investigation_context;
        ctx.record_error(phase, err.to_string());
        ctx.last_response = Some(compose_response(&apology, Some(DEGRADED_QUESTION)));
        ctx.waiting_for_input = true;

        Phase::RespondToUser
    }

    async fn respond_to_user(&self, state: &mut AgentState) -> Phase {
        if state.investigation_context.reply_pending {
            state.investigation_context.reply_pending = false;
            match self.execute(Phase::RespondToUser, state).await {
                Ok(result) => {
                    let requires_response = result.follow_up_question.is_some() || result.requires_user_input;
                    state.push_finding(
                        Phase::RespondToUser,
                        result.key_insight.clone(),
                        json!({ "findings": result.findings }),
                        requires_response,
                    );
                    state.push_recommendations(result.recommendations.iter().cloned());
                    state.push_tools(result.tools_used.iter().cloned());
                    state.set_confidence(result.confidence_score);
                    state.investigation_context.last_response =
                        Some(compose_response(&result.key_insight, result.follow_up_question.as_deref()));
                }
                Err(e) => {
                    self.degrade(state, Phase::RespondToUser, &e);
                }
            }
        }

        if state.investigation_context.last_response.is_none() {
            let fallback = state.latest_finding().map(|f| f.finding.clone());
            state.investigation_context.last_response = fallback;
        }
        state.investigation_context.waiting_for_input = true;
        self.table
            .next(Phase::RespondToUser, Condition::Suspend)
            .unwrap_or(Phase::AwaitUserInput)
    }

    fn request_confirmation(&self, state: &mut AgentState) -> Phase {
        let ctx = &mut state.investigation_context;
        if let Some(action) = &ctx.pending_confirmation {
            let target = action
                .target
                .as_deref()
                .map(|t| format!(" on {}", t))
                .unwrap_or_default();
            let lead = ctx.last_response.clone().unwrap_or_default();
            ctx.last_response = Some(format!(
                "{}\n\nThe next step would {}{}, which changes system state. Reply \"yes\" to confirm, or tell me what you'd prefer instead.",
                lead,
                lower_first(&action.description),
                target
            ));
            info!(
                event = events::CONFIRMATION_REQUESTED,
                "🛑 [ENGINE] {} awaiting confirmation for {:?}", state.session_id, action.kind
            );
        }
        ctx.waiting_for_input = true;
        self.table
            .next(Phase::GetUserConfirmation, Condition::Suspend)
            .unwrap_or(Phase::AwaitUserInput)
    }

    async fn suspend(&self, state: &mut AgentState) -> Result<(), EngineError> {
        state.investigation_context.waiting_for_input = true;
        self.store.save(state).await?;
        info!(
            event = events::SESSION_SUSPENDED,
            "⏸️ [ENGINE] {} waiting for user at {}", state.session_id, state.current_phase
        );
        Ok(())
    }

    async fn finish(&self, state: &mut AgentState) -> Result<(), EngineError> {
        state.current_phase = PhaseCursor::At(Phase::End);
        state.investigation_context.waiting_for_input = false;
        self.store.save(state).await?;
        info!("🏁 [ENGINE] {} investigation complete", state.session_id);
        Ok(())
    }
}

fn compose_response(insight: &str, question: Option<&str>) -> String {
    match question {
        Some(q) => format!("{}\n\n{}", insight, q),
        None => insight.to_string(),
    }
}

fn phase_label(phase: Phase) -> String {
    phase.as_str().replace('_', " ")
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
