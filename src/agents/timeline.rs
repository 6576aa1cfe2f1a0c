use crate::agents::PhaseAgent;

pub struct TimelineAgent;

impl PhaseAgent for TimelineAgent {
    fn name(&self) -> &str {
        "Timeline-Analyst"
    }

    fn system_prompt(&self) -> &str {
        r#"You are an Incident Timeline Analyst. Establish when the problem started and what
changed around that time.

Look for:
- First occurrence of the symptom in logs or metrics
- Deployments, config changes, traffic shifts, certificate or credential expiry near that time
- Whether the onset was sudden or gradual

Your key insight should name the most likely start time and the most suspicious change.
"#
    }
}
