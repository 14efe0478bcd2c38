//! Signature verification capability.

use crate::auth::jwks::VerificationKey;
use jsonwebtoken::Algorithm;

/// The only accepted JWS algorithm.
pub const REQUIRED_ALGORITHM: &str = "RS256";

/// Verify a JWS signature over its signing input with one key.
pub trait SignatureVerifier: Send + Sync {
    /// Returns `true` only if `signature` (base64url) is a valid signature of
    /// `signing_input` under `key`.
    fn verify(&self, signing_input: &str, signature: &str, key: &VerificationKey) -> bool;
}

/// RS256 verifier backed by `jsonwebtoken`.
///
/// The algorithm is fixed here, never taken from the token header.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rs256Verifier;

impl SignatureVerifier for Rs256Verifier {
    fn verify(&self, signing_input: &str, signature: &str, key: &VerificationKey) -> bool {
        match jsonwebtoken::crypto::verify(
            signature,
            signing_input.as_bytes(),
            key.decoding_key(),
            Algorithm::RS256,
        ) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::debug!(
                    target: "pia.auth.signature",
                    kid = %key.kid(),
                    error = %e,
                    "Signature verification errored"
                );
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pia_test_utils::crypto_fixtures::TestRsaKey;
    use pia_test_utils::token_builders::TestTokenBuilder;

    fn key(fixture: &TestRsaKey, kid: &str) -> VerificationKey {
        VerificationKey::from_rsa_components(kid, fixture.modulus(), fixture.exponent()).unwrap()
    }

    fn split(token: &str) -> (&str, &str) {
        token.rsplit_once('.').unwrap()
    }

    #[test]
    fn test_valid_signature_verifies() {
        let k1 = TestRsaKey::primary();
        let token = TestTokenBuilder::new().kid("k1").sign_rs256(&k1);
        let (input, sig) = split(&token);

        assert!(Rs256Verifier.verify(input, sig, &key(&k1, "k1")));
    }

    #[test]
    fn test_signature_from_other_key_fails() {
        let k1 = TestRsaKey::primary();
        let k2 = TestRsaKey::secondary();
        let token = TestTokenBuilder::new().kid("k1").sign_rs256(&k2);
        let (input, sig) = split(&token);

        assert!(!Rs256Verifier.verify(input, sig, &key(&k1, "k1")));
    }

    #[test]
    fn test_tampered_input_fails() {
        let k1 = TestRsaKey::primary();
        let token = TestTokenBuilder::new().kid("k1").sign_rs256(&k1);
        let other = TestTokenBuilder::new().kid("k1").subject("someone-else").sign_rs256(&k1);
        let (_, sig) = split(&token);
        let (other_input, _) = split(&other);

        assert!(!Rs256Verifier.verify(other_input, sig, &key(&k1, "k1")));
    }

    #[test]
    fn test_garbage_signature_fails_without_error() {
        let k1 = TestRsaKey::primary();
        let token = TestTokenBuilder::new().kid("k1").sign_rs256(&k1);
        let (input, _) = split(&token);

        assert!(!Rs256Verifier.verify(input, "!!!", &key(&k1, "k1")));
        assert!(!Rs256Verifier.verify(input, "c2ln", &key(&k1, "k1")));
    }
}
