//! Authentication outcome taxonomy.
//!
//! Every failure of the authorization pipeline is exactly one of these
//! variants. They are denials, never faults: the transport layer maps all of
//! them to 401.

use crate::auth::oidc::DiscoveryError;
use std::fmt;
use thiserror::Error;

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationFailure {
    #[error("token is malformed")]
    MalformedToken,

    #[error("project is not registered")]
    ProjectUnknown,

    #[error("token issuer is not the issuer bound to the project")]
    UnknownIssuer,

    #[error("OIDC discovery failed: {0}")]
    DiscoveryError(#[from] DiscoveryError),

    #[error("no key in the issuer's key set matches the token kid")]
    KeyNotFound,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token is expired or not yet valid")]
    TokenExpired,

    #[error("token audience does not match")]
    AudienceMismatch,

    #[error("{0}")]
    ClaimMismatch(ClaimMismatch),
}

impl AuthenticationFailure {
    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthenticationFailure::MalformedToken => "malformed_token",
            AuthenticationFailure::ProjectUnknown => "project_unknown",
            AuthenticationFailure::UnknownIssuer => "unknown_issuer",
            AuthenticationFailure::DiscoveryError(_) => "discovery_error",
            AuthenticationFailure::KeyNotFound => "key_not_found",
            AuthenticationFailure::SignatureInvalid => "signature_invalid",
            AuthenticationFailure::TokenExpired => "token_expired",
            AuthenticationFailure::AudienceMismatch => "audience_mismatch",
            AuthenticationFailure::ClaimMismatch(_) => "claim_mismatch",
        }
    }
}

/// How a required claim failed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimMismatchKind {
    /// The claim is absent from the token.
    Missing,
    /// The claim is present but not equal to the required value.
    WrongValue,
}

/// Diagnostic detail for `AuthenticationFailure::ClaimMismatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimMismatch {
    /// Name of the first required claim that did not hold.
    pub claim: String,

    /// Whether it was missing or had the wrong value.
    pub kind: ClaimMismatchKind,
}

impl fmt::Display for ClaimMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ClaimMismatchKind::Missing => write!(f, "required claim '{}' is missing", self.claim),
            ClaimMismatchKind::WrongValue => {
                write!(f, "required claim '{}' has an unexpected value", self.claim)
            }
        }
    }
}
