//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating identity tokens the way a CI
//! Identity Provider would issue them, plus the malformed variants the
//! authenticator must reject.

use crate::crypto_fixtures::TestRsaKey;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Issuer used by GitHub Actions identity tokens.
pub const GITHUB_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Audience PIA expects by default.
pub const DEFAULT_AUDIENCE: &str = "pia.eclipse.org";

/// Builder for creating test identity tokens
///
/// Defaults to a GitHub Actions token for `eclipse-foo/foo`, issued now and
/// valid for five minutes, signed under key ID `k1`.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .claim("repository", json!("eclipse-foo/foo"))
///     .expires_at(now + 60)
///     .sign_rs256(&TestRsaKey::primary());
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    kid: String,
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let claims = json!({
            "iss": GITHUB_ISSUER,
            "aud": DEFAULT_AUDIENCE,
            "sub": "repo:eclipse-foo/foo:ref:refs/heads/main",
            "iat": now.timestamp(),
            "exp": (now + Duration::seconds(300)).timestamp(),
        });

        Self {
            kid: "k1".to_string(),
            claims: claims.as_object().cloned().unwrap_or_default(),
        }
    }

    /// Set the `iss` claim
    pub fn issuer(self, issuer: &str) -> Self {
        self.claim("iss", json!(issuer))
    }

    /// Set `aud` to a single string
    pub fn audience(self, audience: &str) -> Self {
        self.claim("aud", json!(audience))
    }

    /// Set the `sub` claim
    pub fn subject(self, subject: &str) -> Self {
        self.claim("sub", json!(subject))
    }

    /// Set the issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.claim("iat", json!(timestamp))
    }

    /// Set the expiration timestamp
    pub fn expires_at(self, timestamp: i64) -> Self {
        self.claim("exp", json!(timestamp))
    }

    /// Set the header key ID
    pub fn kid(mut self, kid: &str) -> Self {
        self.kid = kid.to_string();
        self
    }

    /// Set (or overwrite) an arbitrary claim
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim, including the defaults
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// The claims the token will carry.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Sign with RS256.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails (a broken fixture).
    pub fn sign_rs256(&self, key: &TestRsaKey) -> String {
        self.encode(Algorithm::RS256, &key.encoding_key())
    }

    /// Sign with HS256 using `secret` as the HMAC key.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails (a broken fixture).
    pub fn sign_hs256(&self, secret: &[u8]) -> String {
        self.encode(Algorithm::HS256, &EncodingKey::from_secret(secret))
    }

    /// Produce an `alg: none` token.
    ///
    /// The signature segment is non-empty so the token is structurally
    /// valid and is rejected on its algorithm rather than on its shape.
    pub fn unsigned(&self) -> String {
        let header = json!({"alg": "none", "typ": "JWT", "kid": self.kid});
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(Value::Object(self.claims.clone()).to_string()),
            URL_SAFE_NO_PAD.encode("none"),
        )
    }

    fn encode(&self, alg: Algorithm, key: &EncodingKey) -> String {
        let mut header = Header::new(alg);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(&header, &self.claims, key).expect("test token encoding must succeed")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the payload of a signed token while keeping its signature.
///
/// Models a caller who edits claims in a token they were issued.
///
/// # Panics
///
/// Panics if `token` is not a three-segment compact JWS.
pub fn tamper_payload(token: &str, claims: &Value) -> String {
    let mut parts = token.split('.');
    let header = parts.next().expect("token has a header");
    let _payload = parts.next().expect("token has a payload");
    let signature = parts.next().expect("token has a signature");
    format!(
        "{}.{}.{}",
        header,
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        signature
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_segment(segment: &str) -> Value {
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let builder = TestTokenBuilder::new();
        let claims = builder.claims();

        assert_eq!(claims["iss"], GITHUB_ISSUER);
        assert_eq!(claims["aud"], DEFAULT_AUDIENCE);
        let iat = claims["iat"].as_i64().unwrap();
        let exp = claims["exp"].as_i64().unwrap();
        assert_eq!(exp - iat, 300);
    }

    #[test]
    fn test_without_claim_removes_default() {
        let builder = TestTokenBuilder::new().without_claim("iss");
        assert!(!builder.claims().contains_key("iss"));
    }

    #[test]
    fn test_rs256_header_carries_kid() {
        let token = TestTokenBuilder::new()
            .kid("rotated")
            .sign_rs256(&TestRsaKey::primary());
        let header = decode_segment(token.split('.').next().unwrap());

        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["kid"], "rotated");
    }

    #[test]
    fn test_unsigned_has_three_non_empty_segments() {
        let token = TestTokenBuilder::new().unsigned();
        let parts: Vec<&str> = token.split('.').collect();

        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| !p.is_empty()));
        assert_eq!(decode_segment(parts[0])["alg"], "none");
    }

    #[test]
    fn test_tamper_payload_keeps_header_and_signature() {
        let token = TestTokenBuilder::new().sign_rs256(&TestRsaKey::primary());
        let tampered = tamper_payload(&token, &json!({"repository": "evil/repo"}));

        let original: Vec<&str> = token.split('.').collect();
        let changed: Vec<&str> = tampered.split('.').collect();
        assert_eq!(original[0], changed[0]);
        assert_eq!(original[2], changed[2]);
        assert_ne!(original[1], changed[1]);
    }
}
