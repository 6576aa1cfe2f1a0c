use crate::agents::PhaseAgent;

pub struct HypothesisAgent;

impl PhaseAgent for HypothesisAgent {
    fn name(&self) -> &str {
        "Hypothesis-Agent"
    }

    fn system_prompt(&self) -> &str {
        r#"You are a Root Cause Analyst. Based on the symptom, blast radius and timeline,
formulate the most likely root-cause hypothesis.

List competing hypotheses in "findings", most likely first, but report only the
leading one as the key insight. Your follow-up question should be the cheapest
check that would confirm or refute it.
"#
    }

    fn temperature(&self) -> Option<f32> {
        Some(0.4)
    }
}
