//! Request and response models.

use common::secret::SecretString;
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/upload/sbom`.
#[derive(Debug, Deserialize)]
pub struct UploadSbomRequest {
    /// Registered project the SBOM belongs to.
    pub project_id: String,

    /// Product name; DependencyTrack aggregates SBOMs by product within a project.
    pub product_name: String,

    pub product_version: String,

    /// Base64-encoded CycloneDX JSON SBOM, relayed as-is.
    pub bom: String,

    /// OIDC identity token issued to the caller's CI job.
    pub token: SecretString,
}

impl UploadSbomRequest {
    /// Name of the first required field that is empty, if any.
    pub fn first_empty_field(&self) -> Option<&'static str> {
        [
            ("product_name", self.product_name.is_empty()),
            ("product_version", self.product_version.is_empty()),
            ("bom", self.bom.is_empty()),
        ]
        .into_iter()
        .find_map(|(name, empty)| empty.then_some(name))
    }
}

/// Body of a DependencyTrack `POST /api/v1/bom` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyTrackUploadPayload {
    pub project_name: String,

    pub project_version: String,

    #[serde(rename = "parentUUID")]
    pub parent_uuid: String,

    pub auto_create: bool,

    pub bom: String,
}

impl DependencyTrackUploadPayload {
    /// Build an auto-creating upload under the given parent project.
    pub fn new(
        project_name: String,
        project_version: String,
        parent_uuid: String,
        bom: String,
    ) -> Self {
        Self {
            project_name,
            project_version,
            parent_uuid,
            auto_create: true,
            bom,
        }
    }
}

/// Liveness/readiness response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,

    /// Number of projects in the current registry snapshot.
    pub projects: usize,
}
