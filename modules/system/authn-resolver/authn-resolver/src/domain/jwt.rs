//! Multi-issuer JWT verification.
//!
//! The issuer and key id are read from the token before it is trusted, only
//! to pick a verification key. Nothing from the token reaches the caller
//! until the signature and temporal claims have been verified against that
//! key, and the verified `iss` must equal the issuer used for resolution.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gateway_security::Subject;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::issuer::{IssuerRegistry, KeyResolver};
use super::key_cache::JwkCache;
use crate::api::Authenticator;
use crate::error::AuthNError;

/// Unverified view of the payload, used only for key selection.
#[derive(Deserialize)]
struct IssuerPeek {
    iss: Option<String>,
}

pub struct JwtAuthenticator {
    registry: Arc<IssuerRegistry>,
    keys: Arc<JwkCache>,
    leeway_secs: u64,
}

impl JwtAuthenticator {
    #[must_use]
    pub fn new(registry: Arc<IssuerRegistry>, keys: Arc<JwkCache>) -> Self {
        Self {
            registry,
            keys,
            leeway_secs: 60,
        }
    }

    #[must_use]
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &IssuerRegistry {
        &self.registry
    }

    async fn resolve_key(
        &self,
        resolver: &KeyResolver,
        kid: Option<&str>,
        alg: Algorithm,
    ) -> Result<DecodingKey, AuthNError> {
        match resolver {
            KeyResolver::Jwks { endpoint } => {
                let kid = kid.ok_or(AuthNError::MissingKeyId)?;
                let jwk = self.keys.get(endpoint, kid).await?;
                ensure_algorithm_matches(&jwk, alg)?;
                DecodingKey::from_jwk(&jwk).map_err(|e| AuthNError::InvalidKey(e.to_string()))
            }
            KeyResolver::Static { key, algorithm } => {
                if alg != *algorithm {
                    return Err(AuthNError::UnsupportedAlgorithm(alg));
                }
                Ok(key.clone())
            }
        }
    }

    fn validation(&self, alg: Algorithm, issuer: &str) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = self.leeway_secs;
        validation
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Subject, AuthNError> {
        let header =
            jsonwebtoken::decode_header(token).map_err(|e| AuthNError::MalformedToken(e.to_string()))?;
        let issuer = peek_issuer(token)?;

        let resolver = self
            .registry
            .resolver(&issuer)
            .ok_or_else(|| AuthNError::UnknownIssuer(issuer.clone()))?;

        let key = self
            .resolve_key(resolver, header.kid.as_deref(), header.alg)
            .await?;

        let data = jsonwebtoken::decode::<Map<String, Value>>(
            token,
            &key,
            &self.validation(header.alg, &issuer),
        )?;

        let subject = subject_from_claims(issuer, data.claims)?;
        debug!(subject = %subject, "token verified");
        Ok(subject)
    }
}

/// Read `iss` from the payload without verifying anything.
fn peek_issuer(token: &str) -> Result<String, AuthNError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(AuthNError::MalformedToken("expected three segments".to_owned())),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthNError::MalformedToken(format!("payload: {e}")))?;
    let peek: IssuerPeek = serde_json::from_slice(&bytes)
        .map_err(|e| AuthNError::MalformedToken(format!("payload: {e}")))?;

    match peek.iss {
        Some(iss) if !iss.is_empty() => Ok(iss),
        _ => Err(AuthNError::MissingIssuer),
    }
}

/// The token's algorithm must belong to the key's family; symmetric keys are never accepted.
fn ensure_algorithm_matches(jwk: &Jwk, alg: Algorithm) -> Result<(), AuthNError> {
    let compatible = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => matches!(
            alg,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        AlgorithmParameters::EllipticCurve(_) => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
        AlgorithmParameters::OctetKeyPair(_) => alg == Algorithm::EdDSA,
        AlgorithmParameters::OctetKey(_) => false,
    };
    if compatible {
        Ok(())
    } else {
        Err(AuthNError::UnsupportedAlgorithm(alg))
    }
}

fn string_claim(claims: &Map<String, Value>, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn subject_from_claims(issuer: String, claims: Map<String, Value>) -> Result<Subject, AuthNError> {
    let name = string_claim(&claims, "name");
    let email = string_claim(&claims, "email");
    let id = string_claim(&claims, "sub")
        .or_else(|| email.clone())
        .ok_or_else(|| AuthNError::ClaimsInvalid("token has neither sub nor email".to_owned()))?;

    let mut builder = Subject::builder().id(id).issuer(issuer).claims(claims);
    if let Some(name) = name {
        builder = builder.name(name);
    }
    if let Some(email) = email {
        builder = builder.email(email);
    }
    Ok(builder.build())
}
