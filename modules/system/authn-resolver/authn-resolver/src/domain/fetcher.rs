//! JWKS document retrieval.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use tracing::debug;

use crate::error::KeyCacheError;

/// Maximum accepted JWKS response size (1 MiB).
const MAX_JWKS_RESPONSE_SIZE: usize = 1024 * 1024;

/// Source of key sets for the [`JwkCache`](crate::JwkCache).
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    /// Fetch and parse the key set published at `endpoint`.
    ///
    /// # Errors
    ///
    /// - `Fetch` on transport failures or non-success responses
    /// - `InvalidKeySet` if the body is not a JWKS document
    async fn fetch(&self, endpoint: &str) -> Result<JwkSet, KeyCacheError>;
}

/// Fetches JWKS documents over HTTPS.
pub struct HttpJwksFetcher {
    client: reqwest::Client,
}

impl HttpJwksFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Fetch` if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, KeyCacheError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| KeyCacheError::Fetch {
                endpoint: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self, endpoint: &str) -> Result<JwkSet, KeyCacheError> {
        let fetch_err = |reason: String| KeyCacheError::Fetch {
            endpoint: endpoint.to_owned(),
            reason,
        };

        let mut response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_JWKS_RESPONSE_SIZE as u64)
        {
            return Err(fetch_err("response too large".to_owned()));
        }

        // Chunked bodies carry no length; stop reading once the cap is crossed.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_err(e.to_string()))?
        {
            if bytes.len() + chunk.len() > MAX_JWKS_RESPONSE_SIZE {
                return Err(fetch_err("response too large".to_owned()));
            }
            bytes.extend_from_slice(&chunk);
        }

        let set: JwkSet =
            serde_json::from_slice(&bytes).map_err(|e| KeyCacheError::InvalidKeySet {
                endpoint: endpoint.to_owned(),
                reason: e.to_string(),
            })?;

        debug!(endpoint, keys = set.keys.len(), "fetched key set");
        Ok(set)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn jwks_body() -> serde_json::Value {
        serde_json::json!({
            "keys": [{
                "kty": "RSA",
                "kid": "k1",
                "use": "sig",
                "alg": "RS256",
                "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw",
                "e": "AQAB"
            }]
        })
    }

    #[tokio::test]
    async fn fetches_and_parses_key_set() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/keys");
                then.status(200).json_body(jwks_body());
            })
            .await;

        let fetcher = HttpJwksFetcher::new(Duration::from_secs(5)).unwrap();
        let set = fetcher.fetch(&server.url("/keys")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(set.keys.len(), 1);
        assert_eq!(set.keys[0].common.key_id.as_deref(), Some("k1"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/keys");
                then.status(503);
            })
            .await;

        let fetcher = HttpJwksFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch(&server.url("/keys")).await.unwrap_err();
        assert!(matches!(err, KeyCacheError::Fetch { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn garbage_body_is_an_invalid_key_set() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/keys");
                then.status(200).body("<html>not json</html>");
            })
            .await;

        let fetcher = HttpJwksFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch(&server.url("/keys")).await.unwrap_err();
        assert!(matches!(err, KeyCacheError::InvalidKeySet { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn redirects_are_not_followed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/keys");
                then.status(302).header("location", "http://169.254.169.254/");
            })
            .await;

        let fetcher = HttpJwksFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch(&server.url("/keys")).await.unwrap_err();
        assert!(matches!(err, KeyCacheError::Fetch { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let server = MockServer::start_async().await;
        let padding = "x".repeat(MAX_JWKS_RESPONSE_SIZE);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/keys");
                then.status(200)
                    .body(format!("{{\"keys\":[],\"pad\":\"{padding}\"}}"));
            })
            .await;

        let fetcher = HttpJwksFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch(&server.url("/keys")).await.unwrap_err();
        assert!(
            matches!(&err, KeyCacheError::Fetch { reason, .. } if reason == "response too large"),
            "got {err:?}"
        );
    }

    /// Answer one request with 4 MiB of JSON whitespace, chunked, no length.
    async fn serve_chunked_body(listener: tokio::net::TcpListener) -> std::io::Result<()> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await?;
        let mut request = [0_u8; 1024];
        let read = socket.read(&mut request).await?;
        assert!(read > 0, "client sent no request");
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ntransfer-encoding: chunked\r\n\r\n",
            )
            .await?;
        let chunk = vec![b' '; 64 * 1024];
        for _ in 0..64 {
            socket.write_all(format!("{:x}\r\n", chunk.len()).as_bytes()).await?;
            socket.write_all(&chunk).await?;
            socket.write_all(b"\r\n").await?;
        }
        socket.write_all(b"0\r\n\r\n").await
    }

    #[tokio::test]
    async fn oversized_chunked_body_is_rejected_while_streaming() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // The client hangs up once the cap is crossed; write errors are expected.
        tokio::spawn(async move { drop(serve_chunked_body(listener).await) });

        let fetcher = HttpJwksFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(&format!("http://{addr}/keys"))
            .await
            .unwrap_err();
        assert!(
            matches!(&err, KeyCacheError::Fetch { reason, .. } if reason == "response too large"),
            "got {err:?}"
        );
    }
}
