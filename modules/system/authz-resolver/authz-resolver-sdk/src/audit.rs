//! Audit sink for access decisions.

use std::error::Error;

use gateway_security::{Action, PolicyResource, Subject};

/// Receives exactly one call per authorization decision.
///
/// Calls are made on the request path and must not block: sinks that do I/O
/// are expected to hand records off (e.g. over a channel) and deal with their
/// own delivery failures.
pub trait Auditor: Send + Sync {
    fn allowed(&self, subject: &Subject, resource: &PolicyResource, action: Action);

    fn denied(&self, subject: &Subject, resource: &PolicyResource, action: Action);

    /// Extraction or policy evaluation failed. `resource` and `action` carry
    /// whatever was known when the failure happened.
    fn authorizer_error(
        &self,
        subject: &Subject,
        resource: Option<&PolicyResource>,
        action: Option<Action>,
        error: &dyn Error,
    );

    /// The request reached the decision point without a verified identity.
    fn token_error(&self, error: &dyn Error);
}
