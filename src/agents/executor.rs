//! Default phase executor: one LLM call per phase through the router.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{agent_for, PhaseAgent, PhaseContext, PhaseExecutor, OUTPUT_CONTRACT};
use crate::config::RouterConfig;
use crate::constants::agents::{EXHAUSTED_CONFIDENCE, PROMPT_FINDINGS_WINDOW};
use crate::error::{PhaseError, RouterError};
use crate::llm::RouteRequest;
use crate::state::{AgentState, Finding, Phase, PhaseResult, ProposedAction};

#[derive(Clone, Debug)]
pub struct LlmPhaseExecutor {
    model: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl LlmPhaseExecutor {
    pub fn new(model: Option<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model,
            max_tokens,
            temperature,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(
            config.default_model.clone(),
            config.default_max_tokens,
            config.default_temperature,
        )
    }

    /// The agent's own temperature if it sets one, else the configured default.
    pub fn temperature_for(&self, agent: &dyn PhaseAgent) -> f32 {
        agent.temperature().unwrap_or(self.temperature)
    }
}

#[async_trait]
impl PhaseExecutor for LlmPhaseExecutor {
    async fn execute_phase(
        &self,
        phase: Phase,
        state: &AgentState,
        context: &PhaseContext,
    ) -> Result<PhaseResult, PhaseError> {
        let agent = agent_for(phase).ok_or_else(|| PhaseError::Failed {
            phase: phase.to_string(),
            reason: "no agent handles this phase".to_string(),
        })?;

        let prompt = build_prompt(agent, state, context);
        let mut request = RouteRequest::new(prompt)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature_for(agent))
            .with_cache_key(phase.as_str(), cache_text(state, context));
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        info!("🤖 [AGENT] Sending {} request to {}...", phase, agent.name());
        match context.router.route(request).await {
            Ok(response) => {
                info!(
                    "🤖 [AGENT] Response from {} via {}{}",
                    agent.name(),
                    response.provider,
                    if response.cached { " (cached)" } else { "" }
                );
                Ok(parse_phase_output(&response.content, response.confidence))
            }
            Err(RouterError::NoProviderAvailable { attempted }) => {
                warn!("❌ [AGENT] {} got no answer from any provider (attempted: {:?})", agent.name(), attempted);
                Ok(exhausted_result())
            }
        }
    }
}

/// Apology plus clarifying question used when every provider is down.
pub fn exhausted_result() -> PhaseResult {
    PhaseResult {
        key_insight: "I'm sorry, I couldn't reach an analysis backend to work on this step just now."
            .to_string(),
        follow_up_question: Some(
            "Could you share any additional detail (error messages, recent changes, affected hosts) while I retry?"
                .to_string(),
        ),
        confidence_score: EXHAUSTED_CONFIDENCE,
        requires_user_input: true,
        ..Default::default()
    }
}

pub fn build_prompt(agent: &dyn PhaseAgent, state: &AgentState, context: &PhaseContext) -> String {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str(agent.system_prompt());
    prompt.push_str("\n## Reported problem\n");
    prompt.push_str(&state.user_query);
    prompt.push('\n');

    if !context.uploaded_data.is_empty() {
        prompt.push_str("\n## Uploaded data\n");
        for data in &context.uploaded_data {
            prompt.push_str(&format!(
                "- {} ({}, {}): {}\n",
                data.reference,
                data.filename.as_deref().unwrap_or("unnamed"),
                data.data_type.as_deref().unwrap_or("unknown type"),
                data.summary.as_deref().unwrap_or("no summary"),
            ));
        }
    }

    let findings = recent_findings(state);
    if !findings.is_empty() {
        prompt.push_str("\n## Findings so far\n");
        for f in findings {
            prompt.push_str(&format!("- [{}] {}\n", f.phase, f.finding));
        }
    }

    if let Some(input) = &context.last_user_input {
        prompt.push_str("\n## Latest user input\n");
        prompt.push_str(input);
        prompt.push('\n');
    }

    prompt.push('\n');
    prompt.push_str(OUTPUT_CONTRACT);
    prompt
}

fn recent_findings(state: &AgentState) -> &[Finding] {
    let findings = state.findings();
    &findings[findings.len().saturating_sub(PROMPT_FINDINGS_WINDOW)..]
}

/// The request-specific part of a prompt, without the agent's instructions.
/// This is what the semantic cache compares.
pub fn cache_text(state: &AgentState, context: &PhaseContext) -> String {
    let mut parts = vec![state.user_query.clone()];
    for data in &context.uploaded_data {
        parts.push(data.reference.clone());
        parts.extend(data.summary.clone());
    }
    parts.extend(recent_findings(state).iter().map(|f| f.finding.clone()));
    parts.extend(context.last_user_input.clone());
    parts.join("\n")
}

#[derive(Deserialize)]
struct AgentOutput {
    key_insight: String,
    #[serde(default)]
    follow_up_question: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    findings: Vec<Value>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    tools_used: Vec<String>,
    #[serde(default)]
    requires_user_input: bool,
    #[serde(default)]
    proposed_action: Option<ProposedAction>,
}

/// Turn a model reply into a `PhaseResult`. Non-JSON replies keep the text as
/// the insight and the router-assigned confidence.
pub fn parse_phase_output(content: &str, fallback_confidence: f64) -> PhaseResult {
    let parsed = extract_json(content).and_then(|raw| serde_json::from_str::<AgentOutput>(raw).ok());

    match parsed {
        Some(out) if !out.key_insight.trim().is_empty() => PhaseResult {
            key_insight: out.key_insight.trim().to_string(),
            follow_up_question: out
                .follow_up_question
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
            confidence_score: out.confidence.unwrap_or(fallback_confidence).clamp(0.0, 1.0),
            findings: out
                .findings
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            requires_user_input: out.requires_user_input,
            recommendations: out.recommendations,
            tools_used: out.tools_used,
            proposed_action: out.proposed_action,
        },
        _ => {
            warn!("[AGENT] Reply was not valid phase JSON, using raw text");
            let insight = content
                .split("\n\n")
                .map(str::trim)
                .find(|p| !p.is_empty())
                .unwrap_or("")
                .to_string();
            PhaseResult {
                key_insight: insight,
                confidence_score: fallback_confidence.clamp(0.0, 1.0),
                ..Default::default()
            }
        }
    }
}

/// Slice from the first `{` to the last `}`; tolerates code fences and chatter.
fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ActionKind;

    #[test]
    fn test_parse_fenced_json() {
        let reply = r#"Here you go:
```json
{
  "key_insight": "Initial assessment: medium severity",
  "follow_up_question": "Which mount point is full?",
  "confidence": 0.6,
  "findings": ["/var at 98%", {"host": "db-1"}],
  "tools_used": ["df"]
}
```"#;
        let result = parse_phase_output(reply, 0.9);
        assert_eq!(result.key_insight, "Initial assessment: medium severity");
        assert_eq!(result.follow_up_question.as_deref(), Some("Which mount point is full?"));
        assert_eq!(result.confidence_score, 0.6);
        assert_eq!(result.findings.len(), 2);
        assert_eq!(result.findings[1], r#"{"host":"db-1"}"#);
        assert_eq!(result.tools_used, vec!["df".to_string()]);
    }

    #[test]
    fn test_missing_confidence_uses_router_confidence() {
        let result = parse_phase_output(r#"{"key_insight": "x"}"#, 0.8);
        assert_eq!(result.confidence_score, 0.8);
        assert!(result.follow_up_question.is_none());
    }

    #[test]
    fn test_blank_question_becomes_none() {
        let result = parse_phase_output(r#"{"key_insight": "x", "follow_up_question": "  "}"#, 0.8);
        assert!(result.follow_up_question.is_none());
    }

    #[test]
    fn test_proposed_action_is_parsed() {
        let reply = r#"{"key_insight": "Restart the writer", "proposed_action": {"kind": "restart", "description": "restart postgres", "target": "db-1"}}"#;
        let result = parse_phase_output(reply, 0.9);
        let action = result.proposed_action.unwrap();
        assert_eq!(action.kind, ActionKind::Restart);
        assert!(action.requires_confirmation());
    }

    #[test]
    fn test_plain_text_reply_degrades_gracefully() {
        let result = parse_phase_output("The disk is full because of logs.\n\nMore detail here.", 0.7);
        assert_eq!(result.key_insight, "The disk is full because of logs.");
        assert_eq!(result.confidence_score, 0.7);
        assert!(result.proposed_action.is_none());
    }

    fn context(last_user_input: Option<&str>) -> PhaseContext {
        use crate::llm::retry::RetryPolicy;
        use crate::llm::LlmRouter;
        use crate::sanitize::NoopSanitizer;
        use std::sync::Arc;

        PhaseContext {
            router: Arc::new(LlmRouter::new(vec![], None, Arc::new(NoopSanitizer), RetryPolicy::immediate(), 1)),
            uploaded_data: vec![],
            last_user_input: last_user_input.map(str::to_string),
        }
    }

    #[test]
    fn test_cache_text_leaves_out_agent_instructions() {
        let mut state = AgentState::new("s", "disk is full on db-1");
        state.push_finding(Phase::Triage, "/var is at 100%", serde_json::json!({}), true);
        let ctx = context(Some("only db-1"));
        let agent = agent_for(Phase::DefineBlastRadius).unwrap();

        let text = cache_text(&state, &ctx);

        assert!(text.contains("disk is full on db-1"));
        assert!(text.contains("/var is at 100%"));
        assert!(text.contains("only db-1"));
        assert!(!text.contains(agent.system_prompt().trim()));
        assert!(!text.contains("key_insight"));
        assert!(build_prompt(agent, &state, &ctx).contains("key_insight"));
    }

    #[test]
    fn test_configured_temperature_is_the_default() {
        let executor = LlmPhaseExecutor::new(None, 256, 0.7);
        let triage = agent_for(Phase::Triage).unwrap();
        let hypothesis = agent_for(Phase::FormulateHypothesis).unwrap();

        assert_eq!(executor.temperature_for(triage), 0.7);
        assert_eq!(executor.temperature_for(hypothesis), 0.4);
    }

    #[test]
    fn test_exhausted_result_keeps_single_question_contract() {
        let result = exhausted_result();
        assert!(result.key_insight.starts_with("I'm sorry"));
        assert!(result.follow_up_question.is_some());
        assert!(result.confidence_score <= 0.3);
        assert!(result.requires_user_input);
    }
}
