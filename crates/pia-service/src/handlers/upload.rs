//! SBOM upload handler.
//!
//! Authorizes the caller for the requested project, then relays the SBOM to
//! DependencyTrack under the project's parent UUID. DependencyTrack's status
//! and body are passed back to the caller unchanged.

use crate::errors::PiaError;
use crate::models::{DependencyTrackUploadPayload, UploadSbomRequest};
use crate::observability::metrics;
use crate::routes::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::secret::ExposeSecret;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Handler for POST /v1/upload/sbom
///
/// # Response
///
/// - Upstream status and body when authorized
/// - 400 Bad Request if a required field is empty
/// - 401 Unauthorized if authorization fails
/// - 502 Bad Gateway if DependencyTrack is unreachable
#[instrument(skip_all, name = "pia.upload.sbom")]
pub async fn upload_sbom(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadSbomRequest>,
) -> Result<Response, PiaError> {
    if let Some(field) = request.first_empty_field() {
        return Err(PiaError::BadRequest(format!("{field} must not be empty")));
    }

    let start = Instant::now();
    let result = state
        .authorizer
        .authorize(&request.project_id, request.token.expose_secret())
        .await;

    let authorized = match result {
        Ok(authorized) => {
            metrics::record_authorization("authorized", start.elapsed());
            authorized
        }
        Err(failure) => {
            metrics::record_authorization(failure.kind(), start.elapsed());
            warn!(
                target: "pia.handlers.upload",
                project_id = %request.project_id,
                reason = failure.kind(),
                error = %failure,
                "Upload rejected"
            );
            return Err(failure.into());
        }
    };

    info!(
        target: "pia.handlers.upload",
        project_id = %authorized.project_id,
        subject = authorized.verified_claims.subject().unwrap_or("<none>"),
        product_name = %request.product_name,
        product_version = %request.product_version,
        "Upload authorized, relaying to DependencyTrack"
    );

    let payload = DependencyTrackUploadPayload::new(
        request.product_name,
        request.product_version,
        authorized.destination_reference,
        request.bom,
    );

    let relayed = state.dt_client.upload_bom(&payload).await;
    metrics::record_dependency_track_upload(relayed.as_ref().ok().map(|r| r.status));
    let relayed = relayed?;

    let status = StatusCode::from_u16(relayed.status).map_err(|_| {
        PiaError::UpstreamUnavailable(format!(
            "DependencyTrack returned invalid status {}",
            relayed.status
        ))
    })?;

    info!(
        target: "pia.handlers.upload",
        project_id = %authorized.project_id,
        status = relayed.status,
        "DependencyTrack upload completed"
    );

    Ok((
        status,
        [(header::CONTENT_TYPE, "application/json")],
        relayed.body,
    )
        .into_response())
}
