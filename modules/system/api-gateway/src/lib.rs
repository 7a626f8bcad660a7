//! API Gateway security layers.
//!
//! Two axum middlewares guard every proxied route:
//! - [`auth::authn_middleware`] verifies the bearer token and binds a
//!   [`gateway_security::Subject`] to the request
//! - [`authz::authz_middleware`] derives the `(action, resource)` pair for the
//!   request, consults the policy engine and records the decision
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod audit;
pub mod auth;
pub mod authz;
pub mod config;
pub mod resource;

use axum::Router;
use axum::middleware::from_fn_with_state;

pub use audit::TracingAuditor;
pub use auth::{AuthState, TokenRejection, authn_middleware};
pub use authz::{AuthzState, authz_middleware};
pub use config::ApiGatewayConfig;
pub use resource::{ExtractError, ResourceExtractor};

/// Wrap `router` with the authentication and authorization layers.
///
/// Request execution order (outermost -> innermost):
/// authn -> authz -> router
#[must_use]
pub fn apply_security_layers(router: Router, authn: AuthState, authz: AuthzState) -> Router {
    // `Router::layer` makes the last added layer the outermost one.
    router
        .layer(from_fn_with_state(authz, authz::authz_middleware))
        .layer(from_fn_with_state(authn, auth::authn_middleware))
}
