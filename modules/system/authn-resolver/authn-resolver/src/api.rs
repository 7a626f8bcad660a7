//! Public API trait for token authentication.
//!
//! The API gateway consumes this trait behind an `Arc<dyn Authenticator>`:
//!
//! ```ignore
//! let subject = authenticator.authenticate(token).await?;
//! request.extensions_mut().insert(subject);
//! ```

use async_trait::async_trait;
use gateway_security::Subject;

use crate::error::AuthNError;

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify a raw bearer token (without the `Bearer ` prefix) and return
    /// the identity it carries.
    ///
    /// # Errors
    ///
    /// - `MalformedToken` / `MissingKeyId` / `MissingIssuer` if the token cannot be parsed
    /// - `UnknownIssuer` if no key-resolution strategy is registered for the issuer
    /// - `KeyResolution` if the verification key cannot be obtained
    /// - `SignatureInvalid` / `ClaimsInvalid` if verification fails
    async fn authenticate(&self, token: &str) -> Result<Subject, AuthNError>;
}
