//! Redaction of secrets and personal data before prompts leave the process.

use regex::Regex;

pub trait Sanitizer: Send + Sync {
    /// Must be idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
    fn sanitize(&self, text: &str) -> String;
}

/// Leaves text untouched. Test and offline use only.
pub struct NoopSanitizer;

impl Sanitizer for NoopSanitizer {
    fn sanitize(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Regex-based redactor for common credential and PII shapes.
pub struct PatternSanitizer {
    rules: Vec<(Regex, &'static str)>,
}

impl Default for PatternSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternSanitizer {
    pub fn new() -> Self {
        let specs: [(&str, &'static str); 6] = [
            // key=value style secrets; keep the key name
            (
                r"(?i)\b(password|passwd|pwd|secret|token|api[_-]?key|access[_-]?key)(\s*[:=]\s*)[^\s,;]+",
                "${1}${2}[REDACTED]",
            ),
            (r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*", "Bearer [REDACTED]"),
            (r"\bsk-[A-Za-z0-9_\-]{16,}", "[REDACTED_KEY]"),
            (r"\bAKIA[0-9A-Z]{16}\b", "[REDACTED_KEY]"),
            (r"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----", "[REDACTED_PRIVATE_KEY]"),
            (r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b", "[EMAIL]"),
        ];

        let rules = specs
            .iter()
            .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
                Ok(re) => Some((re, *replacement)),
                Err(e) => {
                    tracing::error!("[SANITIZE] Invalid redaction pattern {}: {}", pattern, e);
                    None
                }
            })
            .collect();
        Self { rules }
    }
}

impl Sanitizer for PatternSanitizer {
    fn sanitize(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (re, replacement) in &self.rules {
            out = re.replace_all(&out, *replacement).into_owned();
        }
        out
    }
}
