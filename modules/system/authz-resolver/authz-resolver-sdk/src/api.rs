//! Public API trait for policy evaluation.

use async_trait::async_trait;

use crate::error::AuthorizerError;
use crate::models::AuthorizationRequest;

/// Evaluates whether a subject may perform an action on a resource.
///
/// The gateway holds one behind an `Arc<dyn Authorizer>`:
///
/// ```ignore
/// let allowed = authorizer.authorize(&request).await?;
/// ```
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns `Ok(true)` to allow and `Ok(false)` to deny.
    ///
    /// # Errors
    ///
    /// - `PolicyEvaluation` if the engine's answer is unusable
    /// - `Timeout` if the engine does not answer in time
    /// - `Unavailable` if the engine cannot be reached
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<bool, AuthorizerError>;
}
