//! Projects file loading.
//!
//! The projects file is a YAML list of entries:
//!
//! ```yaml
//! - project_id: technology.csi
//!   issuer: https://token.actions.githubusercontent.com
//!   dt_parent_uuid: 7d9b3c40-0000-4000-8000-000000000001
//!   required_claims:
//!     repository: eclipse-csi/pia
//! ```

use crate::registry::{ProjectEntry, Registry, RegistryError, RegistryHandle};
use std::path::Path;

/// Parse a projects document into a registry.
///
/// # Errors
///
/// Returns `RegistryError::Parse` for invalid YAML or unknown fields, and
/// any validation error from [`Registry::load`].
pub fn parse_projects_yaml(contents: &str, source: &str) -> Result<Registry, RegistryError> {
    let entries: Vec<ProjectEntry> =
        serde_yaml::from_str(contents).map_err(|e| RegistryError::Parse {
            path: source.to_string(),
            reason: e.to_string(),
        })?;

    Registry::load(entries)
}

/// Read and validate a projects file.
///
/// # Errors
///
/// Returns `RegistryError::Io` if the file cannot be read, otherwise see
/// [`parse_projects_yaml`].
pub fn load_projects_file(path: &Path) -> Result<Registry, RegistryError> {
    let source = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
        path: source.clone(),
        reason: e.to_string(),
    })?;

    let registry = parse_projects_yaml(&contents, &source)?;
    tracing::info!(
        target: "pia.registry",
        path = %source,
        projects = registry.len(),
        "Loaded projects file"
    );
    Ok(registry)
}

/// Re-read the projects file and publish it.
///
/// On failure the handle keeps serving the previous snapshot.
///
/// # Errors
///
/// See [`load_projects_file`].
pub fn reload_projects_file(handle: &RegistryHandle, path: &Path) -> Result<usize, RegistryError> {
    match load_projects_file(path) {
        Ok(registry) => {
            let count = registry.len();
            handle.replace(registry);
            Ok(count)
        }
        Err(e) => {
            tracing::error!(
                target: "pia.registry",
                error = %e,
                "Projects reload failed, keeping previous registry"
            );
            Err(e)
        }
    }
}
