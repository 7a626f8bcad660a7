//! Audit sink that writes every access decision as a structured tracing event.

use std::error::Error;

use authz_resolver_sdk::Auditor;
use gateway_security::{Action, PolicyResource, Subject};

/// Maximum length of a single audited value.
const MAX_SANITIZED_LENGTH: usize = 256;

/// Escape control characters and cap length so audited values cannot forge
/// log lines.
fn sanitize_for_log(input: &str) -> String {
    let mut result = String::with_capacity(input.len().min(MAX_SANITIZED_LENGTH));

    for ch in input.chars().take(MAX_SANITIZED_LENGTH) {
        match ch {
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\\' => result.push_str("\\\\"),
            c if c.is_control() => result.extend(c.escape_unicode()),
            c => result.push(c),
        }
    }

    if input.chars().count() > MAX_SANITIZED_LENGTH {
        result.push_str("...[TRUNCATED]");
    }
    result
}

fn describe(resource: Option<&PolicyResource>) -> String {
    resource.map_or_else(|| "-".to_owned(), |r| sanitize_for_log(&r.to_string()))
}

/// [`Auditor`] backed by `tracing`, emitting on the `api_gateway::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditor;

impl TracingAuditor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Auditor for TracingAuditor {
    fn allowed(&self, subject: &Subject, resource: &PolicyResource, action: Action) {
        tracing::info!(
            decision = "allowed",
            subject = %sanitize_for_log(&subject.to_string()),
            resource = %describe(Some(resource)),
            action = %action,
            "access decision"
        );
    }

    fn denied(&self, subject: &Subject, resource: &PolicyResource, action: Action) {
        tracing::warn!(
            decision = "denied",
            subject = %sanitize_for_log(&subject.to_string()),
            resource = %describe(Some(resource)),
            action = %action,
            "access decision"
        );
    }

    fn authorizer_error(
        &self,
        subject: &Subject,
        resource: Option<&PolicyResource>,
        action: Option<Action>,
        error: &dyn Error,
    ) {
        tracing::error!(
            decision = "authorizer_error",
            subject = %sanitize_for_log(&subject.to_string()),
            resource = %describe(resource),
            action = action.map_or("-", Action::as_str),
            error = %sanitize_for_log(&error.to_string()),
            "access decision"
        );
    }

    fn token_error(&self, error: &dyn Error) {
        tracing::warn!(
            decision = "token_error",
            error = %sanitize_for_log(&error.to_string()),
            "access decision"
        );
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn control_characters_are_escaped() {
        assert_eq!(sanitize_for_log("a\nb\rc\td"), "a\\nb\\rc\\td");
        assert_eq!(sanitize_for_log("x\u{1b}[31m"), "x\\u{1b}[31m");
        assert_eq!(sanitize_for_log("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn long_values_are_truncated() {
        let long = "a".repeat(MAX_SANITIZED_LENGTH + 10);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.ends_with("...[TRUNCATED]"));
        assert_eq!(sanitized.len(), MAX_SANITIZED_LENGTH + "...[TRUNCATED]".len());
    }

    #[test]
    #[traced_test]
    fn decisions_are_logged() {
        let subject = Subject::builder().id("alice").issuer("tweek").build();
        let resource = PolicyResource::new("values/k").with_context("user", "self");
        let auditor = TracingAuditor::new();

        auditor.allowed(&subject, &resource, Action::Read);
        auditor.denied(&subject, &resource, Action::Write);

        assert!(logs_contain("decision=\"allowed\""));
        assert!(logs_contain("decision=\"denied\""));
        assert!(logs_contain("values/k {user=self}"));
    }

    #[test]
    #[traced_test]
    fn forged_newlines_do_not_reach_the_log() {
        let subject = Subject::builder()
            .id("mallory\ndecision=\"allowed\"")
            .issuer("tweek")
            .build();
        TracingAuditor::new().token_error(&std::io::Error::other(subject.to_string()));

        assert!(logs_contain("mallory\\ndecision"));
    }
}
