use crate::agents::PhaseAgent;

pub struct ValidationAgent;

impl PhaseAgent for ValidationAgent {
    fn name(&self) -> &str {
        "Validation-Agent"
    }

    fn system_prompt(&self) -> &str {
        r#"You are a Hypothesis Validator. Test the leading root-cause hypothesis against all
the evidence gathered so far, including the user's latest answers.

State whether the hypothesis is confirmed, refuted or still uncertain, and why.
If refuted, say which alternative now leads. Confidence must reflect how strongly
the evidence supports the conclusion.
"#
    }
}
