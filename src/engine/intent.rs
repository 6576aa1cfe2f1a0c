//! Reading user intent out of free-text replies.

const CONTINUE_TOKENS: &[&str] = &["yes", "y", "yeah", "yep", "continue", "proceed", "next", "ok", "okay", "sure"];

const AFFIRMATIVE_TOKENS: &[&str] = &[
    "yes", "y", "yeah", "yep", "confirm", "confirmed", "approve", "approved", "proceed", "ok", "okay", "sure",
];

const NEGATION_TOKENS: &[&str] = &[
    "no", "not", "don't", "dont", "do not", "stop", "cancel", "abort", "wait", "nope", "never", "hold",
];

const AFFIRMATIVE_PHRASES: &[&str] = &["go ahead", "do it", "go for it"];

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn has_phrase(text: &str, phrases: &[&str]) -> bool {
    let normalized = tokens(text).join(" ");
    phrases.iter().any(|p| {
        if p.contains(' ') {
            format!(" {} ", normalized).contains(&format!(" {} ", p))
        } else {
            normalized.split(' ').any(|t| t == *p)
        }
    })
}

pub fn is_negated(text: &str) -> bool {
    has_phrase(text, NEGATION_TOKENS)
}

/// "yes" / "continue" / "proceed" style replies that ask to move on.
pub fn is_continuation(text: &str) -> bool {
    !is_negated(text) && (has_phrase(text, CONTINUE_TOKENS) || has_phrase(text, AFFIRMATIVE_PHRASES))
}

/// Explicit approval of a state-changing action.
pub fn is_affirmative(text: &str) -> bool {
    !is_negated(text) && (has_phrase(text, AFFIRMATIVE_TOKENS) || has_phrase(text, AFFIRMATIVE_PHRASES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_replies() {
        assert!(is_continuation("yes, continue"));
        assert!(is_continuation("Proceed."));
        assert!(is_continuation("ok"));
        assert!(is_continuation("go ahead please"));
    }

    #[test]
    fn test_informational_replies_are_not_continuation() {
        assert!(!is_continuation("it's only db-1, the replicas look fine"));
        assert!(!is_continuation("/var/log is the full mount"));
    }

    #[test]
    fn test_negation_wins() {
        assert!(!is_continuation("no, don't continue yet"));
        assert!(!is_affirmative("do not proceed"));
        assert!(!is_affirmative("wait, not yet"));
    }

    #[test]
    fn test_affirmative_tokens() {
        assert!(is_affirmative("Yes"));
        assert!(is_affirmative("approved, restart it"));
        assert!(is_affirmative("confirm"));
        assert!(!is_affirmative("what would the restart do?"));
    }

    #[test]
    fn test_substrings_do_not_match() {
        // "yesterday" contains "yes", "nothing" contains "no"
        assert!(!is_affirmative("it broke yesterday"));
        assert!(is_continuation("nothing else, continue"));
    }
}
