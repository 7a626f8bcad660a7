//! `AuthN` Resolver
//!
//! Turns a bearer token into a verified [`gateway_security::Subject`].
//!
//! Verification keys come from an [`IssuerRegistry`] that maps each trusted
//! issuer to a key-resolution strategy: a JWKS endpoint served through the
//! shared [`JwkCache`], or a static RSA key for the platform's own issuer.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod config;
pub mod domain;
pub mod error;

pub use api::Authenticator;
pub use config::{IssuerConfig, SecurityConfig};
pub use domain::fetcher::{HttpJwksFetcher, JwksFetcher};
pub use domain::issuer::{IssuerRegistry, KeyResolver};
pub use domain::jwt::JwtAuthenticator;
pub use domain::key_cache::{JwkCache, KeySet};
pub use error::{AuthNError, ConfigError, KeyCacheError};
