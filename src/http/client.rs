//! HTTP client for the price API
//!
//! Thin wrapper over reqwest that times each request and classifies
//! transport failures.

use reqwest::Client;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::models::TransportFailure;

const USER_AGENT: &str = concat!("price-loadtest/", env!("CARGO_PKG_VERSION"));

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0}ms")]
    Timeout(u128),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("Failed to read response body: {0}")]
    BodyRead(String),
}

impl HttpError {
    /// Map onto the transport failure kinds recorded per iteration
    pub fn failure_kind(&self) -> TransportFailure {
        match self {
            HttpError::Timeout(_) => TransportFailure::Timeout,
            HttpError::ConnectionRefused(_) => TransportFailure::Connect,
            HttpError::BodyRead(_) => TransportFailure::Body,
            HttpError::Build(_) | HttpError::RequestFailed(_) => TransportFailure::Request,
        }
    }
}

/// Timed HTTP response
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
    /// Send to last body byte, in milliseconds
    pub duration_ms: f64,
}

/// HTTP client shared by all virtual users
///
/// Cloning is cheap: clones share the underlying connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client with the given per-request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Send a GET request and read the whole body
    ///
    /// On error the elapsed time up to the failure is returned alongside
    /// the error so callers can still record a duration.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, (HttpError, f64)> {
        debug!("GET {}", url);
        let start = Instant::now();
        let elapsed_ms = |start: Instant| start.elapsed().as_secs_f64() * 1000.0;

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Err((self.classify(&e, url), elapsed_ms(start))),
        };

        let status = response.status();

        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                let err = if e.is_timeout() {
                    HttpError::Timeout(self.timeout.as_millis())
                } else {
                    HttpError::BodyRead(e.to_string())
                };
                return Err((err, elapsed_ms(start)));
            }
        };
        let duration_ms = elapsed_ms(start);

        debug!(
            "Response: {} {} in {:.2}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            duration_ms
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            body,
            duration_ms,
        })
    }

    fn classify(&self, e: &reqwest::Error, url: &str) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout(self.timeout.as_millis())
        } else if e.is_connect() {
            HttpError::ConnectionRefused(url.to_string())
        } else {
            HttpError::RequestFailed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::stub::{StubBehavior, StubPriceService};
    use crate::harness::{build_url, Catalog};

    #[test]
    fn test_error_failure_kind() {
        assert_eq!(HttpError::Timeout(500).failure_kind(), TransportFailure::Timeout);
        assert_eq!(
            HttpError::ConnectionRefused("http://localhost:1".into()).failure_kind(),
            TransportFailure::Connect
        );
        assert_eq!(
            HttpError::BodyRead("eof".into()).failure_kind(),
            TransportFailure::Body
        );
        assert_eq!(
            HttpError::RequestFailed("bad".into()).failure_kind(),
            TransportFailure::Request
        );
    }

    #[tokio::test]
    async fn test_get_reads_status_and_body() {
        let stub = StubPriceService::start_with(StubBehavior::Raw {
            status: 404,
            body: "{\"error\":\"not found\"}",
        })
        .await;

        let catalog = Catalog::reference();
        let url = build_url(&stub.host(), &catalog.iter().next().unwrap().params);

        let client = HttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        let resp = client.get(&url).await.unwrap();

        assert_eq!(resp.status_code, 404);
        assert_eq!(resp.body, b"{\"error\":\"not found\"}".to_vec());
        assert!(resp.duration_ms > 0.0);
    }

    #[tokio::test]
    async fn test_connection_refused_is_classified() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = HttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        let (err, elapsed) = client
            .get(&format!("http://127.0.0.1:{port}/"))
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), TransportFailure::Connect);
        assert!(elapsed >= 0.0);
    }
}
