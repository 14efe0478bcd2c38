//! HTTPS fetch capability used by the OIDC resolver.
//!
//! The resolver never talks to `reqwest` directly; it goes through
//! [`HttpFetcher`] so tests can serve discovery documents from memory.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Default timeout for a single OIDC fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Network-level fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

/// Fetch the body of a URL.
///
/// Implementations must return `FetchError::Status` for any non-2xx
/// response rather than handing back an error page.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// `reqwest`-backed fetcher with request and connect timeouts.
///
/// Redirects are not followed: a 3xx answer is `FetchError::Status`, so the
/// resolver only ever reads from the https URLs it checked itself.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Create a fetcher whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    target: "pia.auth.fetch",
                    error = %e,
                    "Failed to build HTTP client with custom config, using defaults"
                );
                reqwest::Client::builder()
                    .redirect(reqwest::redirect::Policy::none())
                    .build()
                    .unwrap_or_default()
            });

        Self { client }
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(
                target: "pia.auth.fetch",
                url = %url,
                status = %status,
                "Fetch returned non-success status"
            );
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        Ok(body.to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::default();
        let body = fetcher.fetch(&format!("{}/doc", server.uri())).await.unwrap();

        assert_eq!(body, b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_fetch_maps_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::default();
        let err = fetcher
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Status(404));
    }

    #[tokio::test]
    async fn test_fetch_does_not_follow_redirects() {
        let origin = MockServer::start().await;
        let elsewhere = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/jwks", elsewhere.uri()).as_str()),
            )
            .mount(&origin)
            .await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"keys\":[]}"))
            .expect(0)
            .mount(&elsewhere)
            .await;

        let fetcher = ReqwestFetcher::default();
        let err = fetcher
            .fetch(&format!("{}/jwks", origin.uri()))
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Status(302));
    }

    #[tokio::test]
    async fn test_fetch_times_out_on_slow_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new(Duration::from_millis(100));
        let err = fetcher
            .fetch(&format!("{}/slow", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Timeout);
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to be listening.
        let fetcher = ReqwestFetcher::new(Duration::from_secs(2));
        let err = fetcher.fetch("http://127.0.0.1:9/doc").await.unwrap_err();

        assert!(
            matches!(err, FetchError::Transport(_) | FetchError::Timeout),
            "Expected transport failure, got {:?}",
            err
        );
    }
}
