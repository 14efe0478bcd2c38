//! # PIA Test Utilities
//!
//! Shared test utilities for the Project Identity Authority (PIA) service.
//!
//! This crate provides:
//! - Deterministic RSA signing keys (`TestRsaKey`)
//! - Identity token construction (`TestTokenBuilder`)
//! - In-memory OIDC discovery and JWKS serving (`StaticOidcFetcher`)
//! - Server test harness (`TestPiaServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pia_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let key = TestRsaKey::primary();
//!     let fetcher = StaticOidcFetcher::new().with_issuer(GITHUB_ISSUER, &[("k1", &key)]);
//!     let server = TestPiaServer::spawn(
//!         PROJECTS_YAML,
//!         Arc::new(fetcher),
//!         Arc::new(MockDependencyTrackClient::accepting()),
//!     )
//!     .await?;
//!
//!     let token = TestTokenBuilder::new().sign_rs256(&key);
//!     // POST {server.url()}/v1/upload/sbom with the token ...
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod oidc_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use oidc_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
