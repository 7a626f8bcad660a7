use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{TEST_SUBJECT_EMAIL, TEST_SUBJECT_ID, TEST_SUBJECT_ISSUER, TEST_SUBJECT_NAME};

/// `Subject` is the verified caller identity bound to a request.
///
/// Built by the authenticator once a bearer token has been cryptographically
/// verified, then inserted into the request extensions. The extractor and the
/// authorization decision point read it; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Opaque caller identifier (the token's `sub` claim).
    id: String,
    /// Issuer whose key verified the token.
    issuer: String,
    /// Display name, when the token carries one.
    name: Option<String>,
    email: Option<String>,
    /// Raw claims of the verified token.
    #[serde(default)]
    claims: Map<String, Value>,
}

impl Subject {
    /// Create a new `Subject` builder
    #[must_use]
    pub fn builder() -> SubjectBuilder {
        SubjectBuilder::default()
    }

    /// The fixed identity bound to every request when enforcement is disabled.
    #[must_use]
    pub fn test_identity() -> Self {
        Self::builder()
            .id(TEST_SUBJECT_ID)
            .issuer(TEST_SUBJECT_ISSUER)
            .name(TEST_SUBJECT_NAME)
            .email(TEST_SUBJECT_EMAIL)
            .build()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Raw claims of the verified token.
    #[must_use]
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Whether this subject was issued by `issuer`.
    #[must_use]
    pub fn is_issued_by(&self, issuer: &str) -> bool {
        self.issuer == issuer
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.issuer, self.id)
    }
}

#[derive(Default)]
pub struct SubjectBuilder {
    id: Option<String>,
    issuer: Option<String>,
    name: Option<String>,
    email: Option<String>,
    claims: Map<String, Value>,
}

impl SubjectBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn claims(mut self, claims: Map<String, Value>) -> Self {
        self.claims = claims;
        self
    }

    #[must_use]
    pub fn build(self) -> Subject {
        Subject {
            id: self.id.unwrap_or_default(),
            issuer: self.issuer.unwrap_or_default(),
            name: self.name,
            email: self.email,
            claims: self.claims,
        }
    }
}
