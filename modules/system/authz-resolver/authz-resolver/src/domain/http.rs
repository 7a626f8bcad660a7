//! Client for an OPA-compatible policy engine.
//!
//! The request is posted as `{"input": <AuthorizationRequest>}` and the
//! engine is expected to answer `{"result": true|false}`. An undefined
//! result (no `result` field) is a deny.

use std::time::Duration;

use async_trait::async_trait;
use authz_resolver_sdk::{AuthorizationRequest, Authorizer, AuthorizerError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Serialize)]
struct PolicyQuery<'a> {
    input: &'a AuthorizationRequest,
}

#[derive(Deserialize)]
struct PolicyAnswer {
    #[serde(default)]
    result: Option<Value>,
}

pub struct HttpAuthorizer {
    client: reqwest::Client,
    url: String,
}

impl HttpAuthorizer {
    /// # Errors
    ///
    /// Returns `Unavailable` if the HTTP client cannot be constructed.
    pub fn new(url: String, timeout: Duration) -> Result<Self, AuthorizerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthorizerError::Unavailable(e.to_string()))?;
        Ok(Self { client, url })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn transport_error(err: &reqwest::Error) -> AuthorizerError {
    if err.is_timeout() {
        AuthorizerError::Timeout
    } else {
        AuthorizerError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl Authorizer for HttpAuthorizer {
    #[tracing::instrument(skip_all, fields(subject = %request.subject, action = %request.action, item = %request.resource.item))]
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<bool, AuthorizerError> {
        let response = self
            .client
            .post(&self.url)
            .json(&PolicyQuery { input: request })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AuthorizerError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(AuthorizerError::PolicyEvaluation(format!("HTTP {status}")));
        }

        let bytes = response.bytes().await.map_err(|e| transport_error(&e))?;
        let answer: PolicyAnswer = serde_json::from_slice(&bytes)
            .map_err(|e| AuthorizerError::PolicyEvaluation(format!("invalid response: {e}")))?;

        let allowed = match answer.result {
            None => false,
            Some(Value::Bool(allowed)) => allowed,
            Some(other) => {
                return Err(AuthorizerError::PolicyEvaluation(format!(
                    "expected a boolean result, got {other}"
                )));
            }
        };
        debug!(allowed, "policy evaluated");
        Ok(allowed)
    }
}
