//! Project registry.
//!
//! The registry maps a `project_id` to the policy that governs uploads for
//! that project: which Identity Provider may vouch for it, which claims its
//! tokens must carry, and where its SBOMs go.
//!
//! A [`Registry`] is an immutable snapshot. [`RegistryHandle`] publishes the
//! current snapshot and swaps it atomically on reload; readers that already
//! hold a snapshot keep using it until they drop it.

pub mod loader;

pub use loader::{load_projects_file, parse_projects_yaml, reload_projects_file};

use crate::auth::AuthenticationFailure;
use arc_swap::ArcSwap;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Registry construction errors. Fatal at startup; a failed reload keeps the
/// previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("project entry {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("project '{0}' is defined more than once")]
    DuplicateProjectId(String),

    #[error("project '{project_id}' has non-https issuer '{issuer}'")]
    InsecureIssuer { project_id: String, issuer: String },

    #[error("project '{project_id}' has invalid issuer '{issuer}': {reason}")]
    InvalidIssuer {
        project_id: String,
        issuer: String,
        reason: String,
    },

    #[error("failed to read projects file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse projects file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// One project entry as written in the projects file.
///
/// Fields are optional here so that absence is reported as
/// `RegistryError::MissingField` with the entry's position.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectEntry {
    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default)]
    pub issuer: Option<String>,

    /// DependencyTrack parent project UUID.
    #[serde(default)]
    pub dt_parent_uuid: Option<String>,

    #[serde(default)]
    pub required_claims: BTreeMap<String, String>,
}

/// Validated upload policy for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPolicy {
    pub project_id: String,

    /// Expected token issuer, canonicalized at load time and compared
    /// byte-for-byte against `iss`.
    pub issuer: String,

    /// Claims a token must carry, with their exact expected values.
    pub required_claims: BTreeMap<String, String>,

    /// Opaque downstream identifier (DependencyTrack parent UUID).
    pub destination_reference: String,
}

/// Immutable snapshot of all project policies.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    projects: HashMap<String, ProjectPolicy>,
}

impl Registry {
    /// Build a registry from parsed entries.
    ///
    /// # Errors
    ///
    /// - `MissingField` - `project_id`, `issuer` or `dt_parent_uuid` absent or empty
    /// - `DuplicateProjectId` - a `project_id` appears twice
    /// - `InsecureIssuer` - issuer scheme is not https
    /// - `InvalidIssuer` - issuer is not an absolute URL with a host, or has a
    ///   query or fragment
    pub fn load(entries: Vec<ProjectEntry>) -> Result<Self, RegistryError> {
        let mut projects = HashMap::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            let project_id = required(entry.project_id, index, "project_id")?;
            let issuer = required(entry.issuer, index, "issuer")?;
            let destination_reference = required(entry.dt_parent_uuid, index, "dt_parent_uuid")?;

            let issuer = canonical_issuer(&project_id, &issuer)?;

            if projects.contains_key(&project_id) {
                return Err(RegistryError::DuplicateProjectId(project_id));
            }

            projects.insert(
                project_id.clone(),
                ProjectPolicy {
                    project_id,
                    issuer,
                    required_claims: entry.required_claims,
                    destination_reference,
                },
            );
        }

        Ok(Self { projects })
    }

    /// Find the policy for a project.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationFailure::ProjectUnknown` if no entry exists.
    pub fn lookup(&self, project_id: &str) -> Result<&ProjectPolicy, AuthenticationFailure> {
        self.projects
            .get(project_id)
            .ok_or(AuthenticationFailure::ProjectUnknown)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

fn required(
    value: Option<String>,
    index: usize,
    field: &'static str,
) -> Result<String, RegistryError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(RegistryError::MissingField { index, field })
}

/// Parse and canonicalize an issuer.
///
/// The scheme and host are lowercased, and the `/` the URL parser adds to an
/// empty path is dropped again, so `HTTPS://IdP.Example` becomes
/// `https://idp.example`. Path case is preserved.
fn canonical_issuer(project_id: &str, issuer: &str) -> Result<String, RegistryError> {
    let insecure = || RegistryError::InsecureIssuer {
        project_id: project_id.to_string(),
        issuer: issuer.to_string(),
    };
    let invalid = |reason: &str| RegistryError::InvalidIssuer {
        project_id: project_id.to_string(),
        issuer: issuer.to_string(),
        reason: reason.to_string(),
    };

    let url = match reqwest::Url::parse(issuer) {
        Ok(url) => url,
        Err(e) if issuer.to_ascii_lowercase().starts_with("https://") => {
            return Err(invalid(&e.to_string()))
        }
        Err(_) => return Err(insecure()),
    };
    if url.scheme() != "https" {
        return Err(insecure());
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed"));
    }

    let serialized = url.as_str();
    let canonical = if url.path() == "/" && !issuer.ends_with('/') {
        serialized.strip_suffix('/').unwrap_or(serialized)
    } else {
        serialized
    };

    Ok(canonical.to_string())
}

/// Publishes the current registry snapshot.
pub struct RegistryHandle {
    current: ArcSwap<Registry>,
}

impl RegistryHandle {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: ArcSwap::from_pointee(registry),
        }
    }

    /// The current snapshot. Stays valid after a later `replace`.
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Atomically publish a new snapshot, returning the previous one.
    pub fn replace(&self, registry: Registry) -> Arc<Registry> {
        let previous = self.current.swap(Arc::new(registry));
        tracing::info!(
            target: "pia.registry",
            previous_projects = previous.len(),
            projects = self.current.load().len(),
            "Project registry replaced"
        );
        previous
    }
}
