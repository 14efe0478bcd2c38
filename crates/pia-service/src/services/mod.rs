//! Service layer for PIA.
//!
//! # Components
//!
//! - `upload_authorizer` - The authorization pipeline (registry, token, claims)
//! - `dependency_track` - HTTP client relaying SBOMs to DependencyTrack

pub mod dependency_track;
pub mod upload_authorizer;

pub use dependency_track::{DependencyTrackClient, DependencyTrackClientTrait, RelayResponse};
pub use upload_authorizer::{AuthorizedUpload, UploadAuthorizer};
