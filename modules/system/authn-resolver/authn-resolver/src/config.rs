//! Configuration for token verification.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;

/// Security configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// When `false`, every request is bound the fixed test identity.
    /// Never disable outside development environments.
    pub enforce: bool,

    /// Name of the platform's own trusted issuer.
    pub internal_issuer: String,

    /// PEM file holding the internal issuer's RSA public key.
    pub internal_public_key_path: Option<PathBuf>,

    /// Trust Google-issued ID tokens.
    pub google_enabled: bool,

    /// Azure AD tenant whose tokens are trusted.
    pub azure_tenant_id: Option<String>,

    /// Additional OIDC issuers and their JWKS endpoints.
    pub issuers: Vec<IssuerConfig>,

    /// Interval between background refreshes of every JWKS endpoint.
    pub jwks_refresh_interval_secs: u64,

    /// Upper bound for a single JWKS fetch.
    pub key_fetch_timeout_ms: u64,

    /// Clock skew tolerated when validating `exp` / `nbf`.
    pub leeway_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enforce: true,
            internal_issuer: "tweek".to_owned(),
            internal_public_key_path: None,
            google_enabled: true,
            azure_tenant_id: None,
            issuers: Vec::new(),
            jwks_refresh_interval_secs: 24 * 60 * 60,
            key_fetch_timeout_ms: 10_000,
            leeway_secs: 60,
        }
    }
}

impl SecurityConfig {
    /// Reject values that would disable key refresh or key fetching.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwks_refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "jwks_refresh_interval_secs must be greater than zero".to_owned(),
            ));
        }
        if self.key_fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "key_fetch_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A trusted OIDC issuer and the endpoint publishing its signing keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuerConfig {
    pub issuer: String,
    pub jwks_uri: String,
}
