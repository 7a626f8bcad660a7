#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use api_gateway::{AuthState, AuthzState, ResourceExtractor, apply_security_layers};
use async_trait::async_trait;
use authn_resolver::{AuthNError, Authenticator};
use authz_resolver_sdk::{AuthorizationRequest, Auditor, Authorizer, AuthorizerError};
use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::routing::any;
use gateway_security::{Action, PolicyResource, Subject};
use parking_lot::Mutex;
use tower::ServiceExt;

pub const TRUSTED_ISSUER: &str = "tweek";

/// Accepts tokens of the form `<id>@<issuer>` without any cryptography.
pub struct FakeAuthenticator;

#[async_trait]
impl Authenticator for FakeAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Subject, AuthNError> {
        match token.split_once('@') {
            Some((id, issuer)) if issuer == TRUSTED_ISSUER || issuer == "ext" => {
                Ok(Subject::builder().id(id).issuer(issuer).build())
            }
            Some((_, issuer)) => Err(AuthNError::UnknownIssuer(issuer.to_owned())),
            None => Err(AuthNError::MalformedToken("no issuer".to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    Allowed(String, String, Action),
    Denied(String, String, Action),
    AuthorizerError(String, Option<String>, Option<Action>),
    TokenError(String),
}

#[derive(Default)]
pub struct RecordingAuditor {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditor {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

impl Auditor for RecordingAuditor {
    fn allowed(&self, subject: &Subject, resource: &PolicyResource, action: Action) {
        self.events.lock().push(AuditEvent::Allowed(
            subject.id().to_owned(),
            resource.to_string(),
            action,
        ));
    }

    fn denied(&self, subject: &Subject, resource: &PolicyResource, action: Action) {
        self.events.lock().push(AuditEvent::Denied(
            subject.id().to_owned(),
            resource.to_string(),
            action,
        ));
    }

    fn authorizer_error(
        &self,
        subject: &Subject,
        resource: Option<&PolicyResource>,
        action: Option<Action>,
        _error: &dyn std::error::Error,
    ) {
        self.events.lock().push(AuditEvent::AuthorizerError(
            subject.id().to_owned(),
            resource.map(ToString::to_string),
            action,
        ));
    }

    fn token_error(&self, error: &dyn std::error::Error) {
        self.events
            .lock()
            .push(AuditEvent::TokenError(error.to_string()));
    }
}

pub enum Verdict {
    Allow,
    Deny,
    Fail,
    Hang,
}

/// Answers every request with a fixed verdict and records what it was asked.
pub struct ScriptedAuthorizer {
    verdict: Verdict,
    calls: AtomicUsize,
    requests: Mutex<Vec<AuthorizationRequest>>,
}

impl ScriptedAuthorizer {
    pub fn answering(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<AuthorizationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Authorizer for ScriptedAuthorizer {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<bool, AuthorizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        match self.verdict {
            Verdict::Allow => Ok(true),
            Verdict::Deny => Ok(false),
            Verdict::Fail => Err(AuthorizerError::Unavailable("engine down".to_owned())),
            Verdict::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(true)
            }
        }
    }
}

/// Upstream stand-in echoing the resource the decision point attached.
async fn upstream(req: Request) -> String {
    req.extensions()
        .get::<PolicyResource>()
        .map_or_else(|| "unchecked".to_owned(), ToString::to_string)
}

pub struct Harness {
    pub router: Router,
    pub authorizer: Arc<ScriptedAuthorizer>,
    pub auditor: Arc<RecordingAuditor>,
}

pub fn harness(verdict: Verdict) -> Harness {
    harness_with(verdict, true)
}

pub fn harness_with(verdict: Verdict, enforce: bool) -> Harness {
    let authorizer = ScriptedAuthorizer::answering(verdict);
    let auditor = Arc::new(RecordingAuditor::default());

    let authn = AuthState::with_enforce(Arc::new(FakeAuthenticator), enforce);
    let authz = AuthzState {
        authorizer: authorizer.clone(),
        auditor: auditor.clone(),
        extractor: Arc::new(ResourceExtractor::new("/api/v2")),
        trusted_issuer: TRUSTED_ISSUER.to_owned(),
        policy_timeout: Duration::from_millis(100),
    };

    let router = Router::new().route("/{*rest}", any(upstream));
    Harness {
        router: apply_security_layers(router, authn, authz),
        authorizer,
        auditor,
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let response = router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}
