//! Upload authorization integration tests.
//!
//! Drives the full pipeline (registry lookup, OIDC discovery, token
//! verification, claim evaluation) against in-memory Identity Providers.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use common::jwt::DEFAULT_CLOCK_SKEW;
use pia_service::auth::{
    AuthenticationFailure, ClaimMismatch, ClaimMismatchKind, DiscoveryError, FetchError,
    HttpFetcher, OidcResolver, TokenAuthenticator,
};
use pia_service::registry::{parse_projects_yaml, RegistryHandle};
use pia_service::services::UploadAuthorizer;
use pia_test_utils::{
    tamper_payload, StaticOidcFetcher, TestRsaKey, TestTokenBuilder, DEFAULT_AUDIENCE,
    DISCOVERY_PATH, GITHUB_ISSUER,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const NOW: i64 = 1_700_000_000;
const IDP: &str = "https://idp.example";

const PROJECTS: &str = r#"
- project_id: technology.foo
  issuer: https://token.actions.githubusercontent.com
  dt_parent_uuid: 11111111-1111-4111-8111-111111111111
- project_id: technology.bar
  issuer: https://token.actions.githubusercontent.com
  dt_parent_uuid: 22222222-2222-4222-8222-222222222222
  required_claims:
    repository: eclipse-foo/bar
- project_id: p1
  issuer: https://idp.example
  dt_parent_uuid: uuid-1
  required_claims:
    repo: org/p1
- project_id: p-mixed-case
  issuer: HTTPS://IDP.Example
  dt_parent_uuid: uuid-2
"#;

fn github_fetcher() -> Arc<StaticOidcFetcher> {
    Arc::new(
        StaticOidcFetcher::new()
            .with_issuer(GITHUB_ISSUER, &[("k1", &TestRsaKey::primary())])
            .with_issuer(IDP, &[("idp-key", &TestRsaKey::secondary())]),
    )
}

fn authorizer_with(fetcher: Arc<dyn HttpFetcher>) -> UploadAuthorizer {
    let registry = parse_projects_yaml(PROJECTS, "test").unwrap();
    let resolver = Arc::new(OidcResolver::new(fetcher, Duration::from_secs(10)));
    UploadAuthorizer::new(
        Arc::new(RegistryHandle::new(registry)),
        TokenAuthenticator::new(resolver, DEFAULT_CLOCK_SKEW),
        DEFAULT_AUDIENCE.to_string(),
    )
}

fn token() -> TestTokenBuilder {
    TestTokenBuilder::new()
        .issued_at(NOW - 10)
        .expires_at(NOW + 300)
}

#[tokio::test]
async fn test_project_without_required_claims_is_authorized() {
    let fetcher = github_fetcher();
    let authorizer = authorizer_with(fetcher.clone());
    let jwt = token().sign_rs256(&TestRsaKey::primary());

    let upload = authorizer
        .authorize_at("technology.foo", &jwt, NOW)
        .await
        .unwrap();

    assert_eq!(upload.project_id, "technology.foo");
    assert_eq!(
        upload.destination_reference,
        "11111111-1111-4111-8111-111111111111"
    );
    assert_eq!(upload.verified_claims.issuer(), Some(GITHUB_ISSUER));
    assert_eq!(
        fetcher.fetched_urls(),
        vec![
            format!("{GITHUB_ISSUER}{DISCOVERY_PATH}"),
            format!("{GITHUB_ISSUER}/jwks"),
        ]
    );
}

#[tokio::test]
async fn test_wall_clock_authorize_accepts_fresh_token() {
    let authorizer = authorizer_with(github_fetcher());
    let jwt = TestTokenBuilder::new().sign_rs256(&TestRsaKey::primary());

    let upload = authorizer.authorize("technology.foo", &jwt).await.unwrap();

    assert_eq!(upload.project_id, "technology.foo");
}

#[tokio::test]
async fn test_end_to_end_custom_idp() {
    let authorizer = authorizer_with(github_fetcher());
    let jwt = token()
        .issuer(IDP)
        .kid("idp-key")
        .claim("repo", json!("org/p1"))
        .sign_rs256(&TestRsaKey::secondary());

    let upload = authorizer.authorize_at("p1", &jwt, NOW).await.unwrap();

    assert_eq!(upload.project_id, "p1");
    assert_eq!(upload.destination_reference, "uuid-1");
    assert_eq!(upload.verified_claims.get_str("repo"), Some("org/p1"));
}

#[tokio::test]
async fn test_configured_issuer_is_matched_in_canonical_form() {
    let fetcher = github_fetcher();
    let authorizer = authorizer_with(fetcher.clone());
    let jwt = token()
        .issuer(IDP)
        .kid("idp-key")
        .sign_rs256(&TestRsaKey::secondary());

    let upload = authorizer
        .authorize_at("p-mixed-case", &jwt, NOW)
        .await
        .unwrap();

    assert_eq!(upload.destination_reference, "uuid-2");
    assert_eq!(
        fetcher.fetched_urls().first().map(String::as_str),
        Some("https://idp.example/.well-known/openid-configuration")
    );
}

#[tokio::test]
async fn test_unknown_project_makes_no_network_call() {
    let fetcher = github_fetcher();
    let authorizer = authorizer_with(fetcher.clone());
    let jwt = token().sign_rs256(&TestRsaKey::primary());

    let err = authorizer
        .authorize_at("technology.unknown", &jwt, NOW)
        .await
        .unwrap_err();

    assert_eq!(err, AuthenticationFailure::ProjectUnknown);
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_issuer_of_another_project_is_unknown_issuer() {
    let fetcher = github_fetcher();
    let authorizer = authorizer_with(fetcher.clone());
    // Validly signed by the IdP registered for p1, presented for technology.foo
    let jwt = token()
        .issuer(IDP)
        .kid("idp-key")
        .sign_rs256(&TestRsaKey::secondary());

    let err = authorizer
        .authorize_at("technology.foo", &jwt, NOW)
        .await
        .unwrap_err();

    assert_eq!(err, AuthenticationFailure::UnknownIssuer);
    assert_eq!(fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_kid_is_key_not_found() {
    let authorizer = authorizer_with(github_fetcher());
    let jwt = token().kid("rotated-away").sign_rs256(&TestRsaKey::primary());

    let err = authorizer
        .authorize_at("technology.foo", &jwt, NOW)
        .await
        .unwrap_err();

    assert_eq!(err, AuthenticationFailure::KeyNotFound);
}

#[tokio::test]
async fn test_expired_token_with_valid_signature() {
    let authorizer = authorizer_with(github_fetcher());
    let jwt = token()
        .issued_at(NOW - 7200)
        .expires_at(NOW - 3600)
        .sign_rs256(&TestRsaKey::primary());

    let err = authorizer
        .authorize_at("technology.foo", &jwt, NOW)
        .await
        .unwrap_err();

    assert_eq!(err, AuthenticationFailure::TokenExpired);
}

#[tokio::test]
async fn test_wrong_audience() {
    let authorizer = authorizer_with(github_fetcher());
    let jwt = token()
        .audience("sigstore")
        .sign_rs256(&TestRsaKey::primary());

    let err = authorizer
        .authorize_at("technology.foo", &jwt, NOW)
        .await
        .unwrap_err();

    assert_eq!(err, AuthenticationFailure::AudienceMismatch);
}

#[tokio::test]
async fn test_required_claim_match_and_mismatch() {
    let authorizer = authorizer_with(github_fetcher());

    let good = token()
        .claim("repository", json!("eclipse-foo/bar"))
        .sign_rs256(&TestRsaKey::primary());
    let upload = authorizer
        .authorize_at("technology.bar", &good, NOW)
        .await
        .unwrap();
    assert_eq!(
        upload.destination_reference,
        "22222222-2222-4222-8222-222222222222"
    );

    let other = token()
        .claim("repository", json!("eclipse-foo/other"))
        .sign_rs256(&TestRsaKey::primary());
    let err = authorizer
        .authorize_at("technology.bar", &other, NOW)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AuthenticationFailure::ClaimMismatch(ClaimMismatch {
            claim: "repository".to_string(),
            kind: ClaimMismatchKind::WrongValue,
        })
    );

    let missing = token().sign_rs256(&TestRsaKey::primary());
    let err = authorizer
        .authorize_at("technology.bar", &missing, NOW)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AuthenticationFailure::ClaimMismatch(ClaimMismatch {
            claim: "repository".to_string(),
            kind: ClaimMismatchKind::Missing,
        })
    );
}

#[tokio::test]
async fn test_tampered_claims_fail_signature() {
    let authorizer = authorizer_with(github_fetcher());
    let original = token()
        .claim("repository", json!("eclipse-foo/other"))
        .sign_rs256(&TestRsaKey::primary());
    let mut claims = serde_json::Value::Object(token().claims().clone());
    claims["repository"] = json!("eclipse-foo/bar");
    let forged = tamper_payload(&original, &claims);

    let err = authorizer
        .authorize_at("technology.bar", &forged, NOW)
        .await
        .unwrap_err();

    assert_eq!(err, AuthenticationFailure::SignatureInvalid);
}

#[tokio::test]
async fn test_symmetric_and_unsigned_tokens_rejected() {
    let authorizer = authorizer_with(github_fetcher());
    let hs256 = token().sign_hs256(TestRsaKey::primary().modulus().as_bytes());
    let none = token().unsigned();

    for jwt in [hs256, none] {
        let err = authorizer
            .authorize_at("technology.foo", &jwt, NOW)
            .await
            .unwrap_err();
        assert_eq!(err, AuthenticationFailure::SignatureInvalid);
    }
}

#[tokio::test]
async fn test_garbage_token_is_malformed() {
    let authorizer = authorizer_with(github_fetcher());

    let err = authorizer
        .authorize_at("technology.foo", "definitely-not-a-jwt", NOW)
        .await
        .unwrap_err();

    assert_eq!(err, AuthenticationFailure::MalformedToken);
}

#[tokio::test]
async fn test_unreachable_idp_is_discovery_error() {
    let fetcher = Arc::new(StaticOidcFetcher::new().with_failure(
        &format!("{GITHUB_ISSUER}{DISCOVERY_PATH}"),
        FetchError::Transport("connection refused".to_string()),
    ));
    let authorizer = authorizer_with(fetcher);
    let jwt = token().sign_rs256(&TestRsaKey::primary());

    let err = authorizer
        .authorize_at("technology.foo", &jwt, NOW)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthenticationFailure::DiscoveryError(DiscoveryError::Fetch { .. })
    ));
}

#[tokio::test]
async fn test_repeated_calls_are_deterministic() {
    let authorizer = authorizer_with(github_fetcher());
    let good = token().sign_rs256(&TestRsaKey::primary());
    let bad = token().audience("other").sign_rs256(&TestRsaKey::primary());

    let first = authorizer.authorize_at("technology.foo", &good, NOW).await;
    let second = authorizer.authorize_at("technology.foo", &good, NOW).await;
    assert_eq!(first.unwrap(), second.unwrap());

    let first = authorizer.authorize_at("technology.foo", &bad, NOW).await;
    let second = authorizer.authorize_at("technology.foo", &bad, NOW).await;
    assert_eq!(first.unwrap_err(), second.unwrap_err());
}

/// Never answers for one host, answers from a table for everything else.
struct HangingFetcher {
    hanging_prefix: &'static str,
    inner: StaticOidcFetcher,
}

#[async_trait]
impl HttpFetcher for HangingFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url.starts_with(self.hanging_prefix) {
            std::future::pending::<()>().await;
        }
        self.inner.fetch(url).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_issuer_does_not_block_other_issuers() {
    let fetcher = Arc::new(HangingFetcher {
        hanging_prefix: IDP,
        inner: StaticOidcFetcher::new()
            .with_issuer(GITHUB_ISSUER, &[("k1", &TestRsaKey::primary())]),
    });
    let authorizer = authorizer_with(fetcher);

    let slow = token()
        .issuer(IDP)
        .kid("idp-key")
        .claim("repo", json!("org/p1"))
        .sign_rs256(&TestRsaKey::secondary());
    let fast = token().sign_rs256(&TestRsaKey::primary());

    let (slow_result, fast_result) = tokio::join!(
        authorizer.authorize_at("p1", &slow, NOW),
        authorizer.authorize_at("technology.foo", &fast, NOW),
    );

    assert!(fast_result.is_ok());
    assert!(matches!(
        slow_result.unwrap_err(),
        AuthenticationFailure::DiscoveryError(DiscoveryError::Timeout(_))
    ));
}
