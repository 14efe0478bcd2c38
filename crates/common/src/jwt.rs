//! JWT utilities shared across PIA components.
//!
//! This module provides the signature-independent half of JWT handling:
//! - Size limits for DoS prevention
//! - Clock skew constants for `iat`/`exp` validation
//! - Unverified decoding of the header and payload segments
//! - `iat` and `exp` window checks
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned by [`decode_unverified`] is trustworthy until the
//!   signature over [`UnverifiedToken::signing_input`] has been verified
//! - The header `alg` is returned verbatim; callers decide which algorithms
//!   they accept rather than trusting the token's declaration
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_unverified, validate_exp, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let unverified = decode_unverified(token)?;
//! let kid = &unverified.header.kid;
//! // ... look up key, verify signature over unverified.signing_input ...
//! validate_iat(iat, DEFAULT_CLOCK_SKEW)?;
//! validate_exp(exp, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any base64 decoding or JSON
/// parsing. CI identity tokens (GitHub Actions, GitLab, Jenkins) are well
/// under 2KB.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (60 seconds).
///
/// Applied to both ends of the validity window: `iat` may be up to this far
/// in the future and `exp` up to this far in the past.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Upper bound for configuration so a typo cannot silently turn expiry
/// checking off.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during signature-independent JWT validation.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The identity token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWS compact serialization).
    #[error("The identity token is invalid or expired")]
    MalformedToken,

    /// Token header is missing a non-empty string `kid`.
    #[error("The identity token is invalid or expired")]
    MissingKid,

    /// Token header is missing a non-empty string `alg`.
    #[error("The identity token is invalid or expired")]
    MissingAlg,

    /// Token `iat` claim is too far in the future.
    #[error("The identity token is invalid or expired")]
    IatTooFarInFuture,

    /// Token `exp` claim is in the past (beyond clock skew).
    #[error("The identity token is invalid or expired")]
    Expired,
}

// =============================================================================
// Token Types
// =============================================================================

/// The JOSE header fields PIA cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtHeader {
    /// Declared signing algorithm, exactly as written in the token.
    pub alg: String,

    /// Key identifier used to select the verification key.
    pub kid: String,
}

/// A structurally valid but unverified JWT.
///
/// Borrowed from the original token string so the signing input is never
/// re-encoded before verification.
#[derive(Debug, Clone)]
pub struct UnverifiedToken<'a> {
    /// Decoded header.
    pub header: JwtHeader,

    /// Decoded payload object. UNTRUSTED until the signature is verified.
    pub payload: Map<String, Value>,

    /// `base64url(header) || '.' || base64url(payload)`, the bytes covered
    /// by the signature.
    pub signing_input: &'a str,

    /// The base64url-encoded signature segment.
    pub signature: &'a str,
}

// =============================================================================
// Functions
// =============================================================================

/// Decode a compact JWS into header and payload without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - This function does NOT validate the signature
/// - The payload MUST NOT be used for any decision until the signature over
///   `signing_input` has been verified with a trusted key
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong number of segments, empty segment, bad base64,
///   invalid JSON, or a header/payload that is not a JSON object
/// - `MissingAlg` - Header has no non-empty string `alg`
/// - `MissingKid` - Header has no non-empty string `kid`
pub fn decode_unverified(token: &str) -> Result<UnverifiedToken<'_>, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let (signing_input, signature) = token
        .rsplit_once('.')
        .ok_or(JwtValidationError::MalformedToken)?;
    let (header_part, payload_part) = signing_input
        .split_once('.')
        .ok_or(JwtValidationError::MalformedToken)?;

    if header_part.is_empty()
        || payload_part.is_empty()
        || signature.is_empty()
        || payload_part.contains('.')
    {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    }

    let header = decode_json_object(header_part, "header")?;
    let payload = decode_json_object(payload_part, "payload")?;

    let alg = non_empty_str(&header, "alg").ok_or(JwtValidationError::MissingAlg)?;
    let kid = non_empty_str(&header, "kid").ok_or(JwtValidationError::MissingKid)?;

    Ok(UnverifiedToken {
        header: JwtHeader { alg, kid },
        payload,
        signing_input,
        signature,
    })
}

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// # Errors
///
/// Same as [`decode_unverified`].
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    decode_unverified(token).map(|t| t.header.kid)
}

fn decode_json_object(
    segment: &str,
    segment_name: &'static str,
) -> Result<Map<String, Value>, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(
            target: "common.jwt",
            segment = segment_name,
            error = %e,
            "Failed to decode JWT segment base64"
        );
        JwtValidationError::MalformedToken
    })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            tracing::debug!(
                target: "common.jwt",
                segment = segment_name,
                "JWT segment is not a JSON object"
            );
            Err(JwtValidationError::MalformedToken)
        }
        Err(e) => {
            tracing::debug!(
                target: "common.jwt",
                segment = segment_name,
                error = %e,
                "Failed to parse JWT segment JSON"
            );
            Err(JwtValidationError::MalformedToken)
        }
    }
}

fn non_empty_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat` is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    validate_iat_at(iat, clock_skew, chrono::Utc::now().timestamp())
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
///
/// # Errors
///
/// See [`validate_iat`].
pub fn validate_iat_at(iat: i64, clock_skew: Duration, now: i64) -> Result<(), JwtValidationError> {
    let max_iat = now.saturating_add(skew_secs(clock_skew));

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Validate the `exp` (expiration) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::Expired` unless `exp > now - clock_skew`.
pub fn validate_exp(exp: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    validate_exp_at(exp, clock_skew, chrono::Utc::now().timestamp())
}

/// Deterministic `exp` validation against an explicit `now` timestamp.
///
/// # Errors
///
/// See [`validate_exp`].
pub fn validate_exp_at(exp: i64, clock_skew: Duration, now: i64) -> Result<(), JwtValidationError> {
    let min_exp = now.saturating_sub(skew_secs(clock_skew));

    if exp <= min_exp {
        tracing::debug!(
            target: "common.jwt",
            exp = exp,
            now = now,
            min_allowed = min_exp,
            "Token rejected: expired"
        );
        return Err(JwtValidationError::Expired);
    }

    Ok(())
}

fn skew_secs(clock_skew: Duration) -> i64 {
    i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX)
}

// =============================================================================
// Tests
// =============================================================================
