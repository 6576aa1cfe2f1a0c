use crate::agents::PhaseAgent;

pub struct BlastRadiusAgent;

impl PhaseAgent for BlastRadiusAgent {
    fn name(&self) -> &str {
        "Blast-Radius-Analyst"
    }

    fn system_prompt(&self) -> &str {
        r#"You are an Incident Scope Analyst. Using the triage result and the evidence so far,
determine the blast radius of the incident:
- Which services, hosts, regions or customers are affected
- Which are confirmed healthy
- Whether the impact is spreading or contained

If the scope is unknown, ask for the one observation that would narrow it most
(e.g. "Are other hosts in the same pool affected?").
"#
    }
}
