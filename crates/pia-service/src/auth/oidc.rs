//! OIDC discovery.
//!
//! Resolves an issuer to its current signing keys:
//! `{issuer}/.well-known/openid-configuration` -> `jwks_uri` -> JWKS.
//!
//! # Security
//!
//! - Only `https` issuers and `https` key endpoints are contacted
//! - Every resolution fetches fresh documents; nothing is cached between calls
//! - Each fetch is bounded by a timeout regardless of the fetcher in use

use crate::auth::fetch::{FetchError, HttpFetcher};
use crate::auth::jwks::{JwksDocument, KeySet};
use crate::observability::metrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::instrument;

const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Why an issuer's keys could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("refusing to fetch non-https URL: {0}")]
    InsecureUrl(String),

    #[error("fetching {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("fetching {0} timed out")]
    Timeout(String),

    #[error("document at {url} is invalid: {reason}")]
    InvalidDocument { url: String, reason: String },

    #[error("discovery document at {0} has no jwks_uri")]
    MissingJwksUri(String),

    #[error("key '{kid}' is malformed: {reason}")]
    InvalidKey { kid: String, reason: String },
}

impl DiscoveryError {
    /// Bounded label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscoveryError::InsecureUrl(_) => "insecure_url",
            DiscoveryError::Fetch { .. } => "fetch",
            DiscoveryError::Timeout(_) => "timeout",
            DiscoveryError::InvalidDocument { .. } => "invalid_document",
            DiscoveryError::MissingJwksUri(_) => "missing_jwks_uri",
            DiscoveryError::InvalidKey { .. } => "invalid_key",
        }
    }
}

/// Resolve an issuer to the set of keys it currently signs with.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, issuer: &str) -> Result<KeySet, DiscoveryError>;
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    jwks_uri: Option<String>,
}

/// OIDC discovery resolver over an injected [`HttpFetcher`].
pub struct OidcResolver {
    fetcher: Arc<dyn HttpFetcher>,
    fetch_timeout: Duration,
}

impl OidcResolver {
    /// Create a resolver.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Network capability used for both documents
    /// * `fetch_timeout` - Upper bound on each individual fetch
    pub fn new(fetcher: Arc<dyn HttpFetcher>, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            fetch_timeout,
        }
    }

    async fn fetch_bounded(&self, url: &str) -> Result<Vec<u8>, DiscoveryError> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Err(_) | Ok(Err(FetchError::Timeout)) => Err(DiscoveryError::Timeout(url.to_string())),
            Ok(Err(source)) => Err(DiscoveryError::Fetch {
                url: url.to_string(),
                source,
            }),
            Ok(Ok(body)) => Ok(body),
        }
    }

    async fn resolve_inner(&self, issuer: &str) -> Result<KeySet, DiscoveryError> {
        require_https(issuer)?;

        let discovery_url = discovery_url(issuer);
        let body = self.fetch_bounded(&discovery_url).await?;
        let document: DiscoveryDocument =
            serde_json::from_slice(&body).map_err(|e| DiscoveryError::InvalidDocument {
                url: discovery_url.clone(),
                reason: e.to_string(),
            })?;

        let jwks_uri = document
            .jwks_uri
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DiscoveryError::MissingJwksUri(discovery_url.clone()))?;
        require_https(&jwks_uri)?;

        let body = self.fetch_bounded(&jwks_uri).await?;
        let jwks: JwksDocument =
            serde_json::from_slice(&body).map_err(|e| DiscoveryError::InvalidDocument {
                url: jwks_uri.clone(),
                reason: e.to_string(),
            })?;

        KeySet::from_jwks(&jwks).map_err(|e| DiscoveryError::InvalidKey {
            kid: e.kid,
            reason: e.reason,
        })
    }
}

#[async_trait]
impl KeyResolver for OidcResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, issuer: &str) -> Result<KeySet, DiscoveryError> {
        let start = Instant::now();
        let result = self.resolve_inner(issuer).await;

        match &result {
            Ok(keys) => {
                tracing::debug!(
                    target: "pia.auth.oidc",
                    issuer = %issuer,
                    key_count = keys.len(),
                    "Resolved issuer keys"
                );
                metrics::record_oidc_discovery("success", start.elapsed());
            }
            Err(e) => {
                tracing::warn!(
                    target: "pia.auth.oidc",
                    issuer = %issuer,
                    error = %e,
                    "OIDC discovery failed"
                );
                metrics::record_oidc_discovery(e.kind(), start.elapsed());
            }
        }

        result
    }
}

fn require_https(url: &str) -> Result<(), DiscoveryError> {
    if url.starts_with("https://") {
        Ok(())
    } else {
        Err(DiscoveryError::InsecureUrl(url.to_string()))
    }
}

fn discovery_url(issuer: &str) -> String {
    format!("{}{}", issuer.trim_end_matches('/'), WELL_KNOWN_PATH)
}
