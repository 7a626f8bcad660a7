use std::sync::Arc;

use authn_resolver::{AuthNError, Authenticator};
use axum::http::HeaderMap;
use gateway_security::Subject;

/// Why no identity was bound to a request.
///
/// Inserted into the request extensions by [`authn_middleware`] when
/// authentication fails, so the decision point can report the cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("missing bearer token")]
    Missing,
    #[error("token rejected: {0}")]
    Invalid(String),
}

/// Shared state for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    authenticator: Arc<dyn Authenticator>,
    enforce: bool,
}

impl AuthState {
    #[must_use]
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            enforce: true,
        }
    }

    /// Bind the fixed test identity to every request instead of verifying tokens.
    #[must_use]
    pub fn disabled(authenticator: Arc<dyn Authenticator>) -> Self {
        tracing::warn!(
            "authentication enforcement is DISABLED: every request runs as the test identity"
        );
        Self {
            authenticator,
            enforce: false,
        }
    }

    #[must_use]
    pub fn with_enforce(authenticator: Arc<dyn Authenticator>, enforce: bool) -> Self {
        if enforce {
            Self::new(authenticator)
        } else {
            Self::disabled(authenticator)
        }
    }

    #[must_use]
    pub fn enforce(&self) -> bool {
        self.enforce
    }
}

/// Authentication middleware.
///
/// Never rejects a request. For each request:
/// 1. With enforcement disabled, binds [`Subject::test_identity`]
/// 2. Without a bearer token, records [`TokenRejection::Missing`] and continues
/// 3. Verifies the token; on success binds the `Subject`, on failure logs,
///    records [`TokenRejection::Invalid`] and continues
///
/// The authorization decision point is what turns a missing identity into a 401.
pub async fn authn_middleware(
    axum::extract::State(state): axum::extract::State<AuthState>,
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    if !state.enforce {
        req.extensions_mut().insert(Subject::test_identity());
        return next.run(req).await;
    }

    let Some(token) = extract_bearer_token(req.headers()) else {
        req.extensions_mut().insert(TokenRejection::Missing);
        return next.run(req).await;
    };

    match state.authenticator.authenticate(token).await {
        Ok(subject) => {
            req.extensions_mut().insert(subject);
        }
        Err(err) => {
            log_authn_error(&err);
            req.extensions_mut()
                .insert(TokenRejection::Invalid(err.to_string()));
        }
    }
    next.run(req).await
}

/// Key-resolution trouble is an operational problem; everything else is a bad token.
fn log_authn_error(err: &AuthNError) {
    if let AuthNError::KeyResolution(e) = err {
        tracing::warn!(error = %e, "token key resolution failed");
    } else {
        tracing::debug!(error = %err, "token rejected");
    }
}

/// Extract the bearer token from the `Authorization` header.
///
/// The scheme is matched case-insensitively.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
