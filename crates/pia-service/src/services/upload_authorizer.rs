//! Upload authorization pipeline.
//!
//! The single entry point the transport layer uses to decide whether an
//! upload may proceed: registry lookup, token verification against the
//! project's issuer, then required-claim evaluation.

use crate::auth::{AuthenticationFailure, TokenAuthenticator, VerifiedClaims};
use crate::authz;
use crate::registry::RegistryHandle;
use std::sync::Arc;
use tracing::instrument;

/// A request that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedUpload {
    pub project_id: String,

    /// Where the SBOM goes (DependencyTrack parent UUID).
    pub destination_reference: String,

    pub verified_claims: VerifiedClaims,
}

/// Composes registry, authenticator and evaluator.
pub struct UploadAuthorizer {
    registry: Arc<RegistryHandle>,
    authenticator: TokenAuthenticator,
    expected_audience: String,
}

impl UploadAuthorizer {
    pub fn new(
        registry: Arc<RegistryHandle>,
        authenticator: TokenAuthenticator,
        expected_audience: String,
    ) -> Self {
        Self {
            registry,
            authenticator,
            expected_audience,
        }
    }

    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }

    /// Authorize an upload against the wall clock.
    ///
    /// # Errors
    ///
    /// See [`UploadAuthorizer::authorize_at`].
    pub async fn authorize(
        &self,
        project_id: &str,
        token: &str,
    ) -> Result<AuthorizedUpload, AuthenticationFailure> {
        self.authorize_at(project_id, token, chrono::Utc::now().timestamp())
            .await
    }

    /// Authorize an upload at an explicit time (Unix seconds).
    ///
    /// Uses one registry snapshot for the whole call, so a concurrent reload
    /// never mixes policies.
    ///
    /// # Errors
    ///
    /// - `ProjectUnknown` - no policy for `project_id`; no network call is made
    /// - Any authenticator failure for the project's issuer
    /// - `ClaimMismatch` - a required claim is missing or different
    #[instrument(skip_all, fields(project_id = %project_id))]
    pub async fn authorize_at(
        &self,
        project_id: &str,
        token: &str,
        now: i64,
    ) -> Result<AuthorizedUpload, AuthenticationFailure> {
        let registry = self.registry.snapshot();
        let policy = registry.lookup(project_id)?;

        let verified_claims = self
            .authenticator
            .verify_at(token, &policy.issuer, &self.expected_audience, now)
            .await?;

        authz::evaluate(policy, &verified_claims)?;

        Ok(AuthorizedUpload {
            project_id: policy.project_id.clone(),
            destination_reference: policy.destination_reference.clone(),
            verified_claims,
        })
    }
}
