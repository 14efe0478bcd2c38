//! Authentication module for PIA.
//!
//! Verifies OIDC identity tokens against the Identity Provider bound to a
//! project.
//!
//! # Components
//!
//! - `fetch` - Injectable HTTPS fetch capability
//! - `oidc` - OIDC discovery resolver producing per-issuer key sets
//! - `jwks` - JSON Web Key parsing and the `KeySet` type
//! - `signature` - RS256 signature verification capability
//! - `jwt` - Token authenticator (the ordered verification sequence)
//! - `claims` - Untrusted payload and verified claims types
//! - `failure` - The `AuthenticationFailure` outcome taxonomy

pub mod claims;
pub mod failure;
pub mod fetch;
pub mod jwks;
pub mod jwt;
pub mod oidc;
pub mod signature;

pub use claims::VerifiedClaims;
pub use failure::{AuthenticationFailure, ClaimMismatch, ClaimMismatchKind};
pub use fetch::{FetchError, HttpFetcher, ReqwestFetcher};
pub use jwks::{Jwk, JwksDocument, KeySet, VerificationKey};
pub use jwt::TokenAuthenticator;
pub use oidc::{DiscoveryError, KeyResolver, OidcResolver};
pub use signature::{Rs256Verifier, SignatureVerifier, REQUIRED_ALGORITHM};
