//! JSON Web Key Set parsing.
//!
//! Converts an IdP's JWKS document into a [`KeySet`] of RS256 verification
//! keys indexed by `kid`.
//!
//! Selection rules:
//! - Keys without a `kid` are skipped (they can never be selected)
//! - Keys whose `kty` is not `RSA` are skipped
//! - Keys whose `use` is present and not `sig` are skipped
//! - An RSA signing key with missing or undecodable `n`/`e` fails the whole
//!   document, since a broken key set should not silently shrink

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A single JSON Web Key as published by an IdP.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for the keys PIA uses).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Algorithm hint. Informational; the accepted algorithm is fixed.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS document (`{"keys": [...]}`).
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

/// Why a JWK could not be turned into a verification key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("key '{kid}' is unusable: {reason}")]
pub struct InvalidKey {
    pub kid: String,
    pub reason: String,
}

/// A public key usable for RS256 verification.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    decoding_key: Arc<DecodingKey>,
}

impl VerificationKey {
    /// Build a key from base64url-encoded RSA modulus and exponent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the components are not valid base64url.
    pub fn from_rsa_components(kid: &str, n: &str, e: &str) -> Result<Self, InvalidKey> {
        let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|err| InvalidKey {
            kid: kid.to_string(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            kid: kid.to_string(),
            decoding_key: Arc::new(decoding_key),
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Verification keys of one issuer, indexed by `kid`.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, VerificationKey>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a key set from a JWKS document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if an RSA signing key has missing or invalid
    /// components.
    pub fn from_jwks(document: &JwksDocument) -> Result<Self, InvalidKey> {
        let mut set = Self::new();

        for jwk in &document.keys {
            let Some(kid) = jwk.kid.as_deref() else {
                tracing::debug!(
                    target: "pia.auth.jwks",
                    kty = %jwk.kty,
                    "Skipping JWK without kid"
                );
                continue;
            };

            if jwk.kty != "RSA" {
                tracing::debug!(
                    target: "pia.auth.jwks",
                    kid = %kid,
                    kty = %jwk.kty,
                    "Skipping non-RSA JWK"
                );
                continue;
            }

            if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
                tracing::debug!(
                    target: "pia.auth.jwks",
                    kid = %kid,
                    "Skipping JWK not intended for signatures"
                );
                continue;
            }

            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                return Err(InvalidKey {
                    kid: kid.to_string(),
                    reason: "RSA key is missing n or e".to_string(),
                });
            };

            set.insert(VerificationKey::from_rsa_components(kid, n, e)?);
        }

        Ok(set)
    }

    pub fn insert(&mut self, key: VerificationKey) {
        self.keys.insert(key.kid.clone(), key);
    }

    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pia_test_utils::crypto_fixtures::TestRsaKey;
    use serde_json::json;

    fn document(value: serde_json::Value) -> JwksDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_from_jwks_indexes_rsa_keys_by_kid() {
        let k1 = TestRsaKey::primary();
        let k2 = TestRsaKey::secondary();
        let doc = document(json!({"keys": [k1.jwk_json("k1"), k2.jwk_json("k2")]}));

        let set = KeySet::from_jwks(&doc).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("k1").unwrap().kid(), "k1");
        assert!(set.get("k2").is_some());
        assert!(set.get("k3").is_none());
    }

    #[test]
    fn test_from_jwks_skips_keys_without_kid_and_non_rsa() {
        let k1 = TestRsaKey::primary();
        let doc = document(json!({"keys": [
            {"kty": "RSA", "n": k1.modulus(), "e": k1.exponent()},
            {"kty": "EC", "kid": "ec-1", "crv": "P-256", "x": "AA", "y": "AA"},
            {"kty": "RSA", "kid": "enc-1", "use": "enc", "n": k1.modulus(), "e": k1.exponent()},
            k1.jwk_json("k1"),
        ]}));

        let set = KeySet::from_jwks(&doc).unwrap();

        assert_eq!(set.len(), 1);
        assert!(set.get("k1").is_some());
        assert!(set.get("ec-1").is_none());
        assert!(set.get("enc-1").is_none());
    }

    #[test]
    fn test_from_jwks_rejects_rsa_key_missing_components() {
        let doc = document(json!({"keys": [{"kty": "RSA", "kid": "broken", "e": "AQAB"}]}));

        let err = KeySet::from_jwks(&doc).unwrap_err();

        assert_eq!(err.kid, "broken");
    }

    #[test]
    fn test_from_jwks_rejects_undecodable_components() {
        let doc = document(json!({"keys": [
            {"kty": "RSA", "kid": "broken", "n": "!!not base64!!", "e": "AQAB"}
        ]}));

        assert!(KeySet::from_jwks(&doc).is_err());
    }

    #[test]
    fn test_empty_document_yields_empty_set() {
        let set = KeySet::from_jwks(&document(json!({"keys": []}))).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_verification_key_debug_omits_key_material() {
        let k1 = TestRsaKey::primary();
        let key = VerificationKey::from_rsa_components("k1", k1.modulus(), k1.exponent()).unwrap();
        let debug_str = format!("{:?}", key);

        assert!(debug_str.contains("k1"));
        assert!(!debug_str.contains(k1.modulus()));
    }
}
