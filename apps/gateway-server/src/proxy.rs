//! Forwarding of authorized requests to the upstream service.

use std::error::Error as _;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::HOST;
use http::{HeaderMap, HeaderName, StatusCode};
use http_body_util::LengthLimitError;

/// Connection-scoped headers that must not be forwarded (RFC 9110 section 7.6.1).
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("request body exceeds the configured limit")]
    BodyTooLarge,
    #[error("failed to read request body: {0}")]
    Body(axum::Error),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<axum::Error> for ProxyError {
    fn from(err: axum::Error) -> Self {
        // Streamed bodies over `RequestBodyLimitLayer`'s limit surface here.
        let mut source = err.source();
        while let Some(cause) = source {
            if cause.is::<LengthLimitError>() {
                return Self::BodyTooLarge;
            }
            source = cause.source();
        }
        Self::Body(err)
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by `Connection` are connection-scoped too.
    let listed: Vec<HeaderName> = headers
        .get_all(http::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    let hop: Vec<HeaderName> = headers.keys().filter(|n| is_hop_by_hop(n)).cloned().collect();
    for name in hop {
        headers.remove(name);
    }
}

/// HTTP client bound to one upstream base URL.
pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
}

impl Upstream {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Re-issue `req` against the upstream and relay its response.
    ///
    /// # Errors
    ///
    /// Fails if the request body cannot be read or the upstream is unreachable.
    pub async fn forward(&self, req: Request) -> Result<Response, ProxyError> {
        let (parts, body) = req.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", http::uri::PathAndQuery::as_str);
        let url = format!("{}{path_and_query}", self.base_url);

        let body: Bytes = axum::body::to_bytes(body, usize::MAX).await?;
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(HOST);

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        let body = upstream.bytes().await?;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Fallback handler relaying every request to the upstream.
pub async fn forward(State(upstream): State<Arc<Upstream>>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    match upstream.forward(req).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(method = %method, path = %path, error = %err, "forwarding failed");
            let status = err.status();
            (status, status.canonical_reason().unwrap_or_default()).into_response()
        }
    }
}
