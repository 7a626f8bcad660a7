//! Error types for policy evaluation.

use thiserror::Error;

/// Errors that can occur while evaluating a policy.
///
/// Access denial is not an error: it is `Ok(false)` from
/// [`Authorizer::authorize`](crate::Authorizer::authorize).
#[derive(Debug, Error)]
pub enum AuthorizerError {
    /// The policy engine answered, but the answer could not be used.
    #[error("policy evaluation failed: {0}")]
    PolicyEvaluation(String),

    /// The policy engine did not answer in time.
    #[error("policy evaluation timed out")]
    Timeout,

    /// The policy engine could not be reached.
    #[error("policy engine unavailable: {0}")]
    Unavailable(String),
}
