//! Identity token verification.
//!
//! Verifies an OIDC identity token against the issuer and audience a caller
//! expects, using keys resolved fresh from that issuer.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The issuer is compared BEFORE any network call, so a token can only
//!   ever trigger discovery against the issuer registered for its project
//! - Only RS256 is accepted; the header `alg` is checked, never trusted
//! - Expiration, issued-at and audience are validated only after the
//!   signature verified
//! - Each check short-circuits; the first failure is the outcome

use crate::auth::claims::{UntrustedPayload, VerifiedClaims};
use crate::auth::failure::AuthenticationFailure;
use crate::auth::oidc::KeyResolver;
use crate::auth::signature::{Rs256Verifier, SignatureVerifier, REQUIRED_ALGORITHM};
use common::jwt::{decode_unverified, validate_exp_at, validate_iat_at};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Token authenticator over an injected key resolver.
pub struct TokenAuthenticator {
    resolver: Arc<dyn KeyResolver>,
    verifier: Arc<dyn SignatureVerifier>,
    clock_skew: Duration,
}

impl TokenAuthenticator {
    /// Create an authenticator using RS256 signature verification.
    ///
    /// # Arguments
    ///
    /// * `resolver` - Source of the expected issuer's keys
    /// * `clock_skew` - Tolerance applied to `iat` and `exp`
    pub fn new(resolver: Arc<dyn KeyResolver>, clock_skew: Duration) -> Self {
        Self::with_verifier(resolver, Arc::new(Rs256Verifier), clock_skew)
    }

    /// Create an authenticator with a custom signature verifier.
    pub fn with_verifier(
        resolver: Arc<dyn KeyResolver>,
        verifier: Arc<dyn SignatureVerifier>,
        clock_skew: Duration,
    ) -> Self {
        Self {
            resolver,
            verifier,
            clock_skew,
        }
    }

    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Verify a token against the wall clock.
    ///
    /// # Errors
    ///
    /// See [`TokenAuthenticator::verify_at`].
    pub async fn verify(
        &self,
        token: &str,
        expected_issuer: &str,
        expected_audience: &str,
    ) -> Result<VerifiedClaims, AuthenticationFailure> {
        self.verify_at(
            token,
            expected_issuer,
            expected_audience,
            chrono::Utc::now().timestamp(),
        )
        .await
    }

    /// Verify a token at an explicit time (Unix seconds).
    ///
    /// # Errors
    ///
    /// - `MalformedToken` - structure invalid, no `kid`, no string `iss`, or
    ///   no integer `iat`/`exp`
    /// - `UnknownIssuer` - `iss` is not exactly `expected_issuer`
    /// - `DiscoveryError` - keys for `expected_issuer` could not be resolved
    /// - `KeyNotFound` - no key matches the header `kid`
    /// - `SignatureInvalid` - algorithm is not RS256 or the signature is bad
    /// - `TokenExpired` - outside the `iat`/`exp` window
    /// - `AudienceMismatch` - `aud` does not name `expected_audience`
    #[instrument(skip_all)]
    pub async fn verify_at(
        &self,
        token: &str,
        expected_issuer: &str,
        expected_audience: &str,
        now: i64,
    ) -> Result<VerifiedClaims, AuthenticationFailure> {
        // 1. Structure (includes size check via common::jwt)
        let unverified = decode_unverified(token).map_err(|e| {
            tracing::debug!(target: "pia.auth.jwt", error = ?e, "Token structure invalid");
            AuthenticationFailure::MalformedToken
        })?;
        let payload = UntrustedPayload::new(unverified.payload);

        // 2. Issuer binding, before any network call
        let issuer = payload.issuer().ok_or_else(|| {
            tracing::debug!(target: "pia.auth.jwt", "Token payload has no string iss");
            AuthenticationFailure::MalformedToken
        })?;
        if issuer != expected_issuer {
            tracing::debug!(target: "pia.auth.jwt", "Token issuer does not match project issuer");
            return Err(AuthenticationFailure::UnknownIssuer);
        }

        // 3. Keys for the registered issuer
        let key_set = self.resolver.resolve(expected_issuer).await?;

        // 4. Key selection
        let key = key_set.get(&unverified.header.kid).ok_or_else(|| {
            tracing::debug!(
                target: "pia.auth.jwt",
                kid = %unverified.header.kid,
                "No key matches token kid"
            );
            AuthenticationFailure::KeyNotFound
        })?;

        // 5. Signature, RS256 only
        if unverified.header.alg != REQUIRED_ALGORITHM {
            tracing::debug!(
                target: "pia.auth.jwt",
                alg = %unverified.header.alg,
                "Token algorithm rejected"
            );
            return Err(AuthenticationFailure::SignatureInvalid);
        }
        if !self
            .verifier
            .verify(unverified.signing_input, unverified.signature, key)
        {
            tracing::debug!(
                target: "pia.auth.jwt",
                kid = %unverified.header.kid,
                "Token signature invalid"
            );
            return Err(AuthenticationFailure::SignatureInvalid);
        }
        let claims = payload.into_verified();

        // 6. Validity window
        let (Some(iat), Some(exp)) = (claims.issued_at(), claims.expires_at()) else {
            tracing::debug!(target: "pia.auth.jwt", "Token missing integer iat or exp");
            return Err(AuthenticationFailure::MalformedToken);
        };
        validate_iat_at(iat, self.clock_skew, now)
            .and_then(|()| validate_exp_at(exp, self.clock_skew, now))
            .map_err(|e| {
                tracing::debug!(
                    target: "pia.auth.jwt",
                    error = ?e,
                    "Token outside validity window"
                );
                AuthenticationFailure::TokenExpired
            })?;

        // 7. Audience
        if !claims.audience_contains(expected_audience) {
            tracing::debug!(target: "pia.auth.jwt", "Token audience mismatch");
            return Err(AuthenticationFailure::AudienceMismatch);
        }

        tracing::debug!(target: "pia.auth.jwt", "Token verified successfully");
        Ok(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::{KeySet, VerificationKey};
    use crate::auth::oidc::DiscoveryError;
    use async_trait::async_trait;
    use common::jwt::DEFAULT_CLOCK_SKEW;
    use pia_test_utils::crypto_fixtures::TestRsaKey;
    use pia_test_utils::token_builders::TestTokenBuilder;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ISSUER: &str = "https://token.actions.githubusercontent.com";
    const AUDIENCE: &str = "pia.eclipse.org";
    const NOW: i64 = 1_700_000_000;

    /// Resolver returning a fixed key set and counting calls.
    struct FixedResolver {
        result: Result<KeySet, DiscoveryError>,
        calls: AtomicUsize,
    }

    impl FixedResolver {
        fn with_primary_key() -> Self {
            let k1 = TestRsaKey::primary();
            let mut keys = KeySet::new();
            keys.insert(
                VerificationKey::from_rsa_components("k1", k1.modulus(), k1.exponent()).unwrap(),
            );
            Self {
                result: Ok(keys),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(err: DiscoveryError) -> Self {
            Self {
                result: Err(err),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl KeyResolver for FixedResolver {
        async fn resolve(&self, _issuer: &str) -> Result<KeySet, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn authenticator() -> (TokenAuthenticator, Arc<FixedResolver>) {
        let resolver = Arc::new(FixedResolver::with_primary_key());
        (
            TokenAuthenticator::new(resolver.clone(), DEFAULT_CLOCK_SKEW),
            resolver,
        )
    }

    fn builder() -> TestTokenBuilder {
        TestTokenBuilder::new()
            .issuer(ISSUER)
            .audience(AUDIENCE)
            .kid("k1")
            .issued_at(NOW - 10)
            .expires_at(NOW + 300)
    }

    async fn verify(token: &str) -> Result<VerifiedClaims, AuthenticationFailure> {
        let (auth, _) = authenticator();
        auth.verify_at(token, ISSUER, AUDIENCE, NOW).await
    }

    #[tokio::test]
    async fn test_valid_token_returns_full_payload() {
        let token = builder()
            .claim("repository", json!("eclipse-foo/foo"))
            .sign_rs256(&TestRsaKey::primary());

        let claims = verify(&token).await.unwrap();

        assert_eq!(claims.issuer(), Some(ISSUER));
        assert_eq!(claims.get_str("repository"), Some("eclipse-foo/foo"));
    }

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        assert_eq!(
            verify("not-a-token").await.unwrap_err(),
            AuthenticationFailure::MalformedToken
        );
        assert_eq!(
            verify("a.b.c").await.unwrap_err(),
            AuthenticationFailure::MalformedToken
        );
    }

    #[tokio::test]
    async fn test_oversized_token_is_malformed() {
        let token = builder()
            .claim("padding", json!("x".repeat(10_000)))
            .sign_rs256(&TestRsaKey::primary());

        assert_eq!(
            verify(&token).await.unwrap_err(),
            AuthenticationFailure::MalformedToken
        );
    }

    #[tokio::test]
    async fn test_missing_iss_is_malformed() {
        let token = builder()
            .without_claim("iss")
            .sign_rs256(&TestRsaKey::primary());

        assert_eq!(
            verify(&token).await.unwrap_err(),
            AuthenticationFailure::MalformedToken
        );
    }

    #[tokio::test]
    async fn test_issuer_mismatch_skips_resolution() {
        let (auth, resolver) = authenticator();
        let token = builder()
            .issuer("https://evil.example")
            .sign_rs256(&TestRsaKey::primary());

        let err = auth.verify_at(&token, ISSUER, AUDIENCE, NOW).await.unwrap_err();

        assert_eq!(err, AuthenticationFailure::UnknownIssuer);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_issuer_comparison_is_exact() {
        let token = builder()
            .issuer("https://token.actions.githubusercontent.com/")
            .sign_rs256(&TestRsaKey::primary());

        assert_eq!(
            verify(&token).await.unwrap_err(),
            AuthenticationFailure::UnknownIssuer
        );
    }

    #[tokio::test]
    async fn test_discovery_error_propagates_unchanged() {
        let err = DiscoveryError::Timeout("https://x/.well-known/openid-configuration".into());
        let resolver = Arc::new(FixedResolver::failing(err.clone()));
        let auth = TokenAuthenticator::new(resolver, DEFAULT_CLOCK_SKEW);
        let token = builder().sign_rs256(&TestRsaKey::primary());

        let result = auth.verify_at(&token, ISSUER, AUDIENCE, NOW).await;

        assert_eq!(result.unwrap_err(), AuthenticationFailure::DiscoveryError(err));
    }

    #[tokio::test]
    async fn test_unknown_kid() {
        let token = builder().kid("k9").sign_rs256(&TestRsaKey::primary());

        assert_eq!(
            verify(&token).await.unwrap_err(),
            AuthenticationFailure::KeyNotFound
        );
    }

    #[tokio::test]
    async fn test_wrong_key_signature_invalid() {
        let token = builder().sign_rs256(&TestRsaKey::secondary());

        assert_eq!(
            verify(&token).await.unwrap_err(),
            AuthenticationFailure::SignatureInvalid
        );
    }

    #[tokio::test]
    async fn test_hs256_and_none_rejected() {
        let hs = builder().sign_hs256(b"public-key-bytes-as-secret");
        let none = builder().unsigned();

        assert_eq!(
            verify(&hs).await.unwrap_err(),
            AuthenticationFailure::SignatureInvalid
        );
        assert_eq!(
            verify(&none).await.unwrap_err(),
            AuthenticationFailure::SignatureInvalid
        );
    }

    #[tokio::test]
    async fn test_expired_token_with_valid_signature() {
        let token = builder()
            .issued_at(NOW - 7200)
            .expires_at(NOW - 3600)
            .sign_rs256(&TestRsaKey::primary());

        assert_eq!(
            verify(&token).await.unwrap_err(),
            AuthenticationFailure::TokenExpired
        );
    }

    #[tokio::test]
    async fn test_expiry_respects_clock_skew() {
        // Expired 30s ago, within the 60s tolerance
        let within = builder()
            .expires_at(NOW - 30)
            .issued_at(NOW - 600)
            .sign_rs256(&TestRsaKey::primary());
        assert!(verify(&within).await.is_ok());

        // Expired exactly at the edge of the tolerance
        let edge = builder()
            .expires_at(NOW - 60)
            .issued_at(NOW - 600)
            .sign_rs256(&TestRsaKey::primary());
        assert_eq!(
            verify(&edge).await.unwrap_err(),
            AuthenticationFailure::TokenExpired
        );
    }

    #[tokio::test]
    async fn test_future_iat_beyond_skew() {
        let token = builder()
            .issued_at(NOW + 120)
            .expires_at(NOW + 600)
            .sign_rs256(&TestRsaKey::primary());

        assert_eq!(
            verify(&token).await.unwrap_err(),
            AuthenticationFailure::TokenExpired
        );
    }

    #[tokio::test]
    async fn test_missing_exp_after_signature_is_malformed() {
        let token = builder()
            .without_claim("exp")
            .sign_rs256(&TestRsaKey::primary());

        assert_eq!(
            verify(&token).await.unwrap_err(),
            AuthenticationFailure::MalformedToken
        );
    }

    #[tokio::test]
    async fn test_audience_mismatch() {
        let token = builder()
            .audience("someone-else")
            .sign_rs256(&TestRsaKey::primary());

        assert_eq!(
            verify(&token).await.unwrap_err(),
            AuthenticationFailure::AudienceMismatch
        );
    }

    #[tokio::test]
    async fn test_audience_array_containing_expected() {
        let token = builder()
            .claim("aud", json!(["other", AUDIENCE]))
            .sign_rs256(&TestRsaKey::primary());

        assert!(verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_and_wrong_audience_reports_expired_first() {
        let token = builder()
            .audience("someone-else")
            .issued_at(NOW - 7200)
            .expires_at(NOW - 3600)
            .sign_rs256(&TestRsaKey::primary());

        assert_eq!(
            verify(&token).await.unwrap_err(),
            AuthenticationFailure::TokenExpired
        );
    }

    #[tokio::test]
    async fn test_repeated_verification_is_deterministic() {
        let (auth, _) = authenticator();
        let good = builder().sign_rs256(&TestRsaKey::primary());
        let bad = builder().kid("k9").sign_rs256(&TestRsaKey::primary());

        let first = auth.verify_at(&good, ISSUER, AUDIENCE, NOW).await;
        let second = auth.verify_at(&good, ISSUER, AUDIENCE, NOW).await;
        assert_eq!(first.unwrap(), second.unwrap());

        let first = auth.verify_at(&bad, ISSUER, AUDIENCE, NOW).await;
        let second = auth.verify_at(&bad, ISSUER, AUDIENCE, NOW).await;
        assert_eq!(first.unwrap_err(), second.unwrap_err());
    }
}
