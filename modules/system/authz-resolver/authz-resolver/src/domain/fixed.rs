//! Fixed-decision authorizer.

use async_trait::async_trait;
use authz_resolver_sdk::{AuthorizationRequest, Authorizer, AuthorizerError};
use tracing::warn;

/// Answers every request with the same decision.
pub struct StaticAuthorizer {
    allow: bool,
}

impl StaticAuthorizer {
    #[must_use]
    pub fn new(allow: bool) -> Self {
        if allow {
            warn!("static authorizer allows every request; never use this in production");
        }
        Self { allow }
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn authorize(&self, _request: &AuthorizationRequest) -> Result<bool, AuthorizerError> {
        Ok(self.allow)
    }
}
