//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - the registry holds at least one project

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// A PIA with an empty registry rejects every upload, so it reports
/// not ready (503). OIDC issuers are not probed; they are per-project and
/// contacted on demand.
#[tracing::instrument(skip_all, name = "pia.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let projects = state.registry.snapshot().len();

    if projects == 0 {
        tracing::warn!(target: "pia.health", "Readiness check failed: no projects registered");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "not_ready".to_string(),
                projects,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ready".to_string(),
            projects,
        }),
    )
}
