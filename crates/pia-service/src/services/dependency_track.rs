//! DependencyTrack BOM upload client.
//!
//! Relays an authorized SBOM to DependencyTrack and hands back whatever
//! DependencyTrack answered.
//!
//! # Security
//!
//! - The API key is held as a `SecretString` and only exposed when the
//!   request header is built
//! - Timeouts prevent hanging connections
//! - Transport errors are logged server-side; clients see a generic 502

use crate::errors::PiaError;
use crate::models::DependencyTrackUploadPayload;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use std::time::Duration;
use tracing::{instrument, warn};

/// Default timeout for DependencyTrack requests in seconds.
const DT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout in seconds.
const DT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// DependencyTrack's answer, relayed verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Trait for DependencyTrack operations (enables mocking).
#[async_trait::async_trait]
pub trait DependencyTrackClientTrait: Send + Sync {
    /// Upload a BOM.
    ///
    /// Any HTTP answer, success or not, is `Ok`. Only a failure to get an
    /// answer at all is an error.
    async fn upload_bom(
        &self,
        payload: &DependencyTrackUploadPayload,
    ) -> Result<RelayResponse, PiaError>;
}

/// HTTP client for the DependencyTrack BOM endpoint.
#[derive(Clone)]
pub struct DependencyTrackClient {
    client: Client,
    bom_url: String,
    api_key: SecretString,
}

impl DependencyTrackClient {
    /// Create a new DependencyTrack client.
    ///
    /// # Arguments
    ///
    /// * `bom_url` - Full URL of the BOM upload endpoint
    /// * `api_key` - DependencyTrack API key
    ///
    /// # Errors
    ///
    /// Returns `PiaError::Internal` if the HTTP client cannot be built.
    pub fn new(bom_url: String, api_key: SecretString) -> Result<Self, PiaError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DT_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                tracing::error!(
                    target: "pia.services.dependency_track",
                    error = %e,
                    "Failed to build HTTP client"
                );
                PiaError::Internal
            })?;

        Ok(Self {
            client,
            bom_url,
            api_key,
        })
    }

    pub fn bom_url(&self) -> &str {
        &self.bom_url
    }
}

#[async_trait::async_trait]
impl DependencyTrackClientTrait for DependencyTrackClient {
    #[instrument(skip_all, fields(project_name = %payload.project_name))]
    async fn upload_bom(
        &self,
        payload: &DependencyTrackUploadPayload,
    ) -> Result<RelayResponse, PiaError> {
        let response = self
            .client
            .post(&self.bom_url)
            .header("X-Api-Key", self.api_key.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                warn!(
                    target: "pia.services.dependency_track",
                    error = %e,
                    "DependencyTrack request failed"
                );
                PiaError::UpstreamUnavailable(format!("DependencyTrack request failed: {}", e))
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            warn!(
                target: "pia.services.dependency_track",
                error = %e,
                "Failed to read DependencyTrack response"
            );
            PiaError::UpstreamUnavailable(format!("Failed to read DependencyTrack response: {}", e))
        })?;

        tracing::debug!(
            target: "pia.services.dependency_track",
            status = status,
            "DependencyTrack responded"
        );

        Ok(RelayResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Mock DependencyTrack client for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock client that records uploads.
    pub struct MockDependencyTrackClient {
        /// Response to return, or `None` to fail.
        response: Option<RelayResponse>,
        /// Number of calls made.
        call_count: AtomicUsize,
        /// Payloads received, in order.
        payloads: Mutex<Vec<DependencyTrackUploadPayload>>,
    }

    impl MockDependencyTrackClient {
        /// Create a mock that always answers 200 with a processing token.
        pub fn accepting() -> Self {
            Self::with_response(200, br#"{"token":"00000000-0000-4000-8000-000000000000"}"#)
        }

        /// Create a mock that answers with the given status and body.
        pub fn with_response(status: u16, body: &[u8]) -> Self {
            Self {
                response: Some(RelayResponse {
                    status,
                    body: body.to_vec(),
                }),
                call_count: AtomicUsize::new(0),
                payloads: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock whose uploads fail at the transport level.
        pub fn failing() -> Self {
            Self {
                response: None,
                call_count: AtomicUsize::new(0),
                payloads: Mutex::new(Vec::new()),
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Payloads received so far.
        pub fn payloads(&self) -> Vec<DependencyTrackUploadPayload> {
            self.payloads
                .lock()
                .map(|p| p.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl DependencyTrackClientTrait for MockDependencyTrackClient {
        async fn upload_bom(
            &self,
            payload: &DependencyTrackUploadPayload,
        ) -> Result<RelayResponse, PiaError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut payloads) = self.payloads.lock() {
                payloads.push(payload.clone());
            }

            self.response.clone().ok_or_else(|| {
                PiaError::UpstreamUnavailable("Mock DependencyTrack client error".to_string())
            })
        }
    }
}
