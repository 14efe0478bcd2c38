//! Required-claim evaluation.
//!
//! A project may pin any number of token claims to exact values (for
//! example `repository: eclipse-foo/foo`). Every pinned claim must be
//! present in the verified token with exactly that string value.

use crate::auth::{AuthenticationFailure, ClaimMismatch, ClaimMismatchKind, VerifiedClaims};
use crate::registry::ProjectPolicy;
use serde_json::Value;

/// Check a project's required claims against verified claims.
///
/// Requirements are checked in claim-name order and the first failure is
/// reported. A present claim with a non-string value is a `WrongValue`.
///
/// # Errors
///
/// Returns `AuthenticationFailure::ClaimMismatch` naming the failing claim.
pub fn evaluate(
    policy: &ProjectPolicy,
    claims: &VerifiedClaims,
) -> Result<(), AuthenticationFailure> {
    for (name, expected) in &policy.required_claims {
        let kind = match claims.get(name) {
            None => Some(ClaimMismatchKind::Missing),
            Some(Value::String(actual)) if actual == expected => None,
            Some(_) => Some(ClaimMismatchKind::WrongValue),
        };

        if let Some(kind) = kind {
            tracing::debug!(
                target: "pia.authz",
                project_id = %policy.project_id,
                claim = %name,
                kind = ?kind,
                "Required claim not satisfied"
            );
            return Err(AuthenticationFailure::ClaimMismatch(ClaimMismatch {
                claim: name.clone(),
                kind,
            }));
        }
    }

    Ok(())
}
