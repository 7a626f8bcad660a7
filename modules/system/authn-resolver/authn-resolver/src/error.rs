//! Error types for the `AuthN` resolver.

use std::path::PathBuf;

use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

/// Errors raised by the JWKS key cache.
#[derive(Debug, Error)]
pub enum KeyCacheError {
    /// The endpoint was never loaded; the cache does not fetch unknown endpoints on demand.
    #[error("endpoint not cached: {endpoint}")]
    EndpointNotCached { endpoint: String },

    #[error("key '{kid}' not found at {endpoint}")]
    KeyNotFound { endpoint: String, kid: String },

    /// More than one key in a set shares the requested key id.
    #[error("{count} keys share id '{kid}' at {endpoint}")]
    AmbiguousKey {
        endpoint: String,
        kid: String,
        count: usize,
    },

    #[error("failed to fetch key set from {endpoint}: {reason}")]
    Fetch { endpoint: String, reason: String },

    #[error("timed out fetching key set from {endpoint}")]
    FetchTimeout { endpoint: String },

    #[error("invalid key set from {endpoint}: {reason}")]
    InvalidKeySet { endpoint: String, reason: String },
}

/// Errors raised while verifying a bearer token.
///
/// None of these fail a request directly: the authentication middleware logs
/// them and lets the request continue without a bound identity.
#[derive(Debug, Error)]
pub enum AuthNError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("token header has no key id")]
    MissingKeyId,

    #[error("token has no issuer")]
    MissingIssuer,

    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    #[error("key resolution failed: {0}")]
    KeyResolution(#[from] KeyCacheError),

    /// The resolved key material cannot be used for verification.
    #[error("invalid verification key: {0}")]
    InvalidKey(String),

    #[error("unsupported algorithm {0:?} for the resolved key")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),

    #[error("signature invalid")]
    SignatureInvalid,

    #[error("claims invalid: {0}")]
    ClaimsInvalid(String),
}

impl From<jsonwebtoken::errors::Error> for AuthNError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => Self::ClaimsInvalid(err.to_string()),
            _ => Self::MalformedToken(err.to_string()),
        }
    }
}

/// Errors raised while building the issuer registry from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("issuer '{0}' is registered more than once")]
    DuplicateIssuer(String),

    #[error("failed to read key file {}: {source}", .path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid public key in {}: {reason}", .path.display())]
    InvalidKey { path: PathBuf, reason: String },

    #[error("invalid security configuration: {0}")]
    Invalid(String),
}
