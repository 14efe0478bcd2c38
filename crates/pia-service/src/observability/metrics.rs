//! Metrics definitions for PIA.
//!
//! All metrics follow Prometheus naming conventions:
//! - `pia_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: the handful of routed paths, everything else is `/other`
//! - `status`: 3 values (success, error, timeout) or a discovery error kind
//! - `outcome`: `authorized` or an `AuthenticationFailure` kind
//!
//! Project IDs and issuers are never used as labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("pia_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Authorization is dominated by two OIDC fetches
        .set_buckets_for_metric(
            Matcher::Prefix("pia_authorization".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set authorization buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("pia_oidc_discovery".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set OIDC discovery buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `pia_http_requests_total`, `pia_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures framework-level rejections (400/415/422 from the JSON
/// extractor, 404, 405) as well as handler responses.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("pia_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("pia_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path to a bounded label.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/v1/upload/sbom" => "/v1/upload/sbom",
        _ => "/other",
    }
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record an authorization decision
///
/// Metric: `pia_authorizations_total`, `pia_authorization_duration_seconds`
/// Labels: `outcome`
pub fn record_authorization(outcome: &'static str, duration: Duration) {
    histogram!("pia_authorization_duration_seconds",
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());

    counter!("pia_authorizations_total",
        "outcome" => outcome
    )
    .increment(1);
}

// ============================================================================
// OIDC Discovery Metrics
// ============================================================================

/// Record an OIDC key resolution
///
/// Metric: `pia_oidc_discovery_total`, `pia_oidc_discovery_duration_seconds`
/// Labels: `status` (`success` or a discovery error kind)
pub fn record_oidc_discovery(status: &'static str, duration: Duration) {
    histogram!("pia_oidc_discovery_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("pia_oidc_discovery_total",
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Upstream Metrics
// ============================================================================

/// Record a DependencyTrack relay attempt
///
/// Metric: `pia_dependency_track_uploads_total`
/// Labels: `status` (upstream status category, or `unavailable`)
pub fn record_dependency_track_upload(status_code: Option<u16>) {
    let status = status_code.map_or("unavailable", categorize_status_code);

    counter!("pia_dependency_track_uploads_total",
        "status" => status
    )
    .increment(1);
}
