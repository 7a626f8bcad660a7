//! Issuer registry: which key-resolution strategy verifies tokens from which issuer.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

use jsonwebtoken::{Algorithm, DecodingKey};
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::error::ConfigError;

pub const GOOGLE_ISSUER: &str = "https://accounts.google.com";
pub const GOOGLE_JWKS_URI: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// How the verification key for an issuer is obtained.
#[derive(Clone)]
pub enum KeyResolver {
    /// Keys published at a JWKS endpoint, served through the key cache.
    Jwks { endpoint: String },
    /// A single long-lived key that is not rotated through the cache.
    Static {
        key: DecodingKey,
        algorithm: Algorithm,
    },
}

impl std::fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jwks { endpoint } => f.debug_struct("Jwks").field("endpoint", endpoint).finish(),
            Self::Static { algorithm, .. } => f
                .debug_struct("Static")
                .field("algorithm", algorithm)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct IssuerRegistry {
    resolvers: HashMap<String, KeyResolver>,
}

impl IssuerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration.
    ///
    /// Registers Google (when enabled), the Azure AD tenant (when set), every
    /// configured OIDC issuer, and the internal issuer's static RSA key (when a
    /// key path is set).
    ///
    /// # Errors
    ///
    /// - `DuplicateIssuer` if two sources register the same issuer
    /// - `KeyFile` / `InvalidKey` if the internal public key cannot be loaded
    /// - `Invalid` if `cfg` fails [`SecurityConfig::validate`]
    pub fn from_config(cfg: &SecurityConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let mut registry = Self::new();

        if cfg.google_enabled {
            registry.register_jwks(GOOGLE_ISSUER, GOOGLE_JWKS_URI)?;
        }

        if let Some(tenant) = cfg.azure_tenant_id.as_deref() {
            let tenant = tenant.trim();
            if tenant.is_empty() {
                return Err(ConfigError::Invalid("azure_tenant_id is empty".to_owned()));
            }
            registry.register_jwks(
                format!("https://sts.windows.net/{tenant}/"),
                format!("https://login.microsoftonline.com/{tenant}/discovery/v2.0/keys"),
            )?;
        }

        for issuer in &cfg.issuers {
            registry.register_jwks(issuer.issuer.as_str(), issuer.jwks_uri.as_str())?;
        }

        match cfg.internal_public_key_path.as_deref() {
            Some(path) => {
                let key = load_rsa_public_key(path)?;
                registry.register(
                    cfg.internal_issuer.as_str(),
                    KeyResolver::Static {
                        key,
                        algorithm: Algorithm::RS256,
                    },
                )?;
            }
            None => warn!(
                issuer = %cfg.internal_issuer,
                "no public key configured for the internal issuer; its tokens will be rejected"
            ),
        }

        info!(issuers = registry.resolvers.len(), "issuer registry ready");
        Ok(registry)
    }

    /// Register a key-resolution strategy for `issuer`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIssuer` if `issuer` already has a strategy.
    pub fn register(
        &mut self,
        issuer: impl Into<String>,
        resolver: KeyResolver,
    ) -> Result<(), ConfigError> {
        match self.resolvers.entry(issuer.into()) {
            Entry::Occupied(existing) => Err(ConfigError::DuplicateIssuer(existing.key().clone())),
            Entry::Vacant(slot) => {
                slot.insert(resolver);
                Ok(())
            }
        }
    }

    /// Register `issuer` as verified by keys published at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIssuer` if `issuer` already has a strategy.
    pub fn register_jwks(
        &mut self,
        issuer: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<(), ConfigError> {
        self.register(
            issuer,
            KeyResolver::Jwks {
                endpoint: endpoint.into(),
            },
        )
    }

    #[must_use]
    pub fn resolver(&self, issuer: &str) -> Option<&KeyResolver> {
        self.resolvers.get(issuer)
    }

    /// Every JWKS endpoint referenced by the registry, sorted and deduplicated.
    #[must_use]
    pub fn jwks_endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self
            .resolvers
            .values()
            .filter_map(|r| match r {
                KeyResolver::Jwks { endpoint } => Some(endpoint.clone()),
                KeyResolver::Static { .. } => None,
            })
            .collect();
        endpoints.sort_unstable();
        endpoints.dedup();
        endpoints
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

/// Load an RSA public key from a PEM file (`PUBLIC KEY` or `RSA PUBLIC KEY`).
///
/// # Errors
///
/// Returns `KeyFile` if the file cannot be read and `InvalidKey` if it holds
/// no usable RSA public key.
pub fn load_rsa_public_key(path: &Path) -> Result<DecodingKey, ConfigError> {
    let pem = std::fs::read(path).map_err(|source| ConfigError::KeyFile {
        path: path.to_path_buf(),
        source,
    })?;
    DecodingKey::from_rsa_pem(&pem).map_err(|e| ConfigError::InvalidKey {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
