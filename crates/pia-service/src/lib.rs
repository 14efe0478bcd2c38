//! Project Identity Authority (PIA) Service Library
//!
//! PIA lets a project's CI job upload SBOMs to DependencyTrack without a
//! long-lived secret. The job presents an OIDC identity token; PIA verifies
//! it against the issuer registered for the project, checks the project's
//! required claims, and relays the SBOM on success.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> auth/, authz/, registry/
//! ```
//!
//! # Modules
//!
//! - `auth` - Token authentication (OIDC discovery, JWKS, RS256, time and audience checks)
//! - `authz` - Required-claim evaluation against a project's policy
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Request and response bodies
//! - `observability` - Prometheus metrics
//! - `registry` - Project registry and YAML loading
//! - `routes` - Axum router setup
//! - `services` - Upload authorization and DependencyTrack relay

pub mod auth;
pub mod authz;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod registry;
pub mod routes;
pub mod services;
