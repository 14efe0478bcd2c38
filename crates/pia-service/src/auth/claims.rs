//! Token payload types.
//!
//! A decoded payload starts life as [`UntrustedPayload`]. Only the
//! authenticator can turn it into [`VerifiedClaims`], and only after the
//! signature check has succeeded, so nothing downstream can evaluate claims
//! that were never verified.

use serde_json::{Map, Value};
use std::fmt;

/// Payload of a token whose signature has not been checked yet.
///
/// The only thing read from it before verification is `iss`, and that value
/// is used solely for an equality comparison against the registered issuer.
pub(crate) struct UntrustedPayload(Map<String, Value>);

impl UntrustedPayload {
    pub(crate) fn new(payload: Map<String, Value>) -> Self {
        Self(payload)
    }

    /// The claimed issuer, if present as a string.
    pub(crate) fn issuer(&self) -> Option<&str> {
        self.0.get("iss").and_then(Value::as_str)
    }

    /// Promote to verified claims. Call only after the signature verified.
    pub(crate) fn into_verified(self) -> VerifiedClaims {
        VerifiedClaims(self.0)
    }
}

/// The decoded payload of a token whose signature, issuer, validity window
/// and audience have all been checked.
///
/// Values are JSON-typed; required-claim evaluation compares them against
/// registry strings. Debug output lists claim names only, since claim values
/// can include repository paths and user identities.
#[derive(Clone, PartialEq)]
pub struct VerifiedClaims(Map<String, Value>);

impl VerifiedClaims {
    /// Raw value of a claim.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Claim value if it is a JSON string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Claim value if it is a JSON integer.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.get_i64("iat")
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.get_i64("exp")
    }

    /// Whether the `aud` claim names `expected`.
    ///
    /// `aud` may be a single string (must be equal) or an array of strings
    /// (must contain `expected`). Any other shape never matches.
    pub fn audience_contains(&self, expected: &str) -> bool {
        match self.0.get("aud") {
            Some(Value::String(aud)) => aud == expected,
            Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(expected)),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for VerifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedClaims")
            .field("names", &self.0.keys().collect::<Vec<_>>())
            .finish()
    }
}
