//! `AuthZ` Resolver
//!
//! Implementations of the [`authz_resolver_sdk::Authorizer`] capability:
//! an HTTP client for an OPA-compatible policy engine and a fixed
//! allow/deny authorizer for development setups.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;

use std::sync::Arc;

use authz_resolver_sdk::{Authorizer, AuthorizerError};

pub use config::AuthorizerConfig;
pub use domain::fixed::StaticAuthorizer;
pub use domain::http::HttpAuthorizer;

/// Build the authorizer selected by `cfg`.
///
/// # Errors
///
/// Returns `Unavailable` if the HTTP client cannot be constructed.
pub fn build_authorizer(cfg: &AuthorizerConfig) -> Result<Arc<dyn Authorizer>, AuthorizerError> {
    match cfg {
        AuthorizerConfig::Http { url, timeout_ms } => Ok(Arc::new(HttpAuthorizer::new(
            url.clone(),
            std::time::Duration::from_millis(*timeout_ms),
        )?)),
        AuthorizerConfig::Static { allow } => Ok(Arc::new(StaticAuthorizer::new(*allow))),
    }
}
