//! Authorization decision point.
//!
//! Per request:
//! 1. No bound [`Subject`]: audit `token_error`, respond 401
//! 2. Subject issued by the trusted internal issuer: forward without policy evaluation
//! 3. Extraction fails: audit `authorizer_error`, respond 400
//! 4. Policy evaluation fails or times out: audit `authorizer_error`, respond 401
//! 5. Policy denies: audit `denied`, respond 403
//! 6. Policy allows: audit `allowed`, forward with `Action` and `PolicyResource`
//!    in the request extensions
//!
//! Every branch makes exactly one audit call. Response bodies carry only the
//! status reason phrase.
//!
//! The trusted-issuer bypass relies on the authentication middleware binding
//! a `Subject` only after cryptographic verification; the issuer is never
//! taken from an unverified claim.

use std::sync::Arc;
use std::time::Duration;

use authz_resolver_sdk::{AuthorizationRequest, Auditor, Authorizer, AuthorizerError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gateway_security::Subject;

use crate::auth::TokenRejection;
use crate::resource::ResourceExtractor;

/// Shared state for the authorization middleware.
#[derive(Clone)]
pub struct AuthzState {
    pub authorizer: Arc<dyn Authorizer>,
    pub auditor: Arc<dyn Auditor>,
    pub extractor: Arc<ResourceExtractor>,
    /// Issuer whose subjects bypass policy evaluation.
    pub trusted_issuer: String,
    pub policy_timeout: Duration,
}

/// Plain status response whose body is the canonical reason phrase.
fn status_response(status: StatusCode) -> Response {
    (status, status.canonical_reason().unwrap_or_default()).into_response()
}

pub async fn authz_middleware(
    axum::extract::State(state): axum::extract::State<AuthzState>,
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let Some(subject) = req.extensions().get::<Subject>().cloned() else {
        let rejection = req
            .extensions()
            .get::<TokenRejection>()
            .cloned()
            .unwrap_or(TokenRejection::Missing);
        tracing::debug!(error = %rejection, "request has no verified identity");
        state.auditor.token_error(&rejection);
        return status_response(StatusCode::UNAUTHORIZED);
    };

    if subject.is_issued_by(&state.trusted_issuer) {
        tracing::debug!(subject = %subject, "trusted issuer, skipping policy evaluation");
        return next.run(req).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let action = state.extractor.action(&method, &path);

    let (action, resource) =
        match state
            .extractor
            .extract(&method, &path, req.uri().query(), &subject)
        {
            Ok(extracted) => extracted,
            Err(err) => {
                tracing::warn!(subject = %subject, method = %method, path = %path, error = %err, "cannot derive policy resource");
                state
                    .auditor
                    .authorizer_error(&subject, None, Some(action), &err);
                return status_response(StatusCode::BAD_REQUEST);
            }
        };

    let request = AuthorizationRequest::new(&subject, action, &resource);
    let decision = tokio::time::timeout(state.policy_timeout, state.authorizer.authorize(&request))
        .await
        .unwrap_or(Err(AuthorizerError::Timeout));

    match decision {
        Err(err) => {
            tracing::error!(subject = %subject, resource = %resource, action = %action, error = %err, "policy evaluation failed");
            state
                .auditor
                .authorizer_error(&subject, Some(&resource), Some(action), &err);
            status_response(StatusCode::UNAUTHORIZED)
        }
        Ok(false) => {
            state.auditor.denied(&subject, &resource, action);
            status_response(StatusCode::FORBIDDEN)
        }
        Ok(true) => {
            state.auditor.allowed(&subject, &resource, action);
            req.extensions_mut().insert(action);
            req.extensions_mut().insert(resource);
            next.run(req).await
        }
    }
}
