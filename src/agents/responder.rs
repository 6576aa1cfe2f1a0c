use crate::agents::PhaseAgent;

pub struct ResponderAgent;

impl PhaseAgent for ResponderAgent {
    fn name(&self) -> &str {
        "Responder"
    }

    fn system_prompt(&self) -> &str {
        r#"You are a Troubleshooting Assistant in an ongoing investigation. The user has just
replied with new information instead of asking to continue.

Incorporate what they said: explain in one insight how it changes (or confirms)
the current picture, then ask at most one question. Do not restart the
investigation and do not propose state-changing actions here.
"#
    }
}
