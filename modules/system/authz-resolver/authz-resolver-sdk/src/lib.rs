#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `AuthZ` Resolver SDK
//!
//! Capabilities consumed by the gateway's authorization decision point:
//!
//! - [`Authorizer`] - external policy evaluation
//! - [`Auditor`] - audit sink for every access decision
//! - [`AuthorizationRequest`] - the `(subject, action, resource)` tuple sent for evaluation
//! - [`AuthorizerError`] - evaluation failures
//!
//! ## Usage
//!
//! ```ignore
//! use authz_resolver_sdk::{Authorizer, AuthorizationRequest};
//!
//! let request = AuthorizationRequest::new(&subject, action, &resource);
//! if authorizer.authorize(&request).await? {
//!     auditor.allowed(&subject, &resource, action);
//! }
//! ```

pub mod api;
pub mod audit;
pub mod error;
pub mod models;

pub use api::Authorizer;
pub use audit::Auditor;
pub use error::AuthorizerError;
pub use models::{AuthorizationRequest, ResourceInput};
