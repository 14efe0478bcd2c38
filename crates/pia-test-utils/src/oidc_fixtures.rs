//! In-memory OIDC discovery for tests
//!
//! `StaticOidcFetcher` answers the resolver's fetches from a URL table, so
//! authorization tests run without a network and can count how often the
//! issuer was contacted.

use crate::crypto_fixtures::TestRsaKey;
use async_trait::async_trait;
use pia_service::auth::{FetchError, HttpFetcher};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Path appended to an issuer to reach its discovery document.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Serves discovery and JWKS documents from memory.
///
/// Unknown URLs answer `FetchError::Status(404)`.
///
/// # Example
/// ```rust,ignore
/// let fetcher = StaticOidcFetcher::new()
///     .with_issuer(GITHUB_ISSUER, &[("k1", &TestRsaKey::primary())]);
/// assert_eq!(fetcher.call_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct StaticOidcFetcher {
    responses: HashMap<String, Result<Vec<u8>, FetchError>>,
    calls: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl StaticOidcFetcher {
    /// An empty fetcher; every URL is a 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `issuer` with a JWKS containing `keys` (kid, key) pairs.
    ///
    /// The JWKS is served from `{issuer}/jwks`.
    pub fn with_issuer(self, issuer: &str, keys: &[(&str, &TestRsaKey)]) -> Self {
        let base = issuer.trim_end_matches('/');
        let jwks_uri = format!("{base}/jwks");
        let jwks: Vec<Value> = keys.iter().map(|(kid, key)| key.jwk_json(kid)).collect();

        self.with_json(
            &format!("{base}{DISCOVERY_PATH}"),
            &json!({"issuer": issuer, "jwks_uri": jwks_uri}),
        )
        .with_json(&jwks_uri, &json!({ "keys": jwks }))
    }

    /// Serve `body` as JSON at `url`.
    pub fn with_json(self, url: &str, body: &Value) -> Self {
        self.with_body(url, body.to_string().into_bytes())
    }

    /// Serve raw bytes at `url`.
    pub fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), Ok(body));
        self
    }

    /// Fail fetches of `url` with `error`.
    pub fn with_failure(mut self, url: &str, error: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(error));
        self
    }

    /// Number of fetches made, successful or not.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs fetched, in order.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpFetcher for StaticOidcFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(url.to_string());
        }

        self.responses
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}
