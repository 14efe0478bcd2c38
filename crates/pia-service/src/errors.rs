//! PIA error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Authentication failures are always 401; the diagnostic variant is logged
//! server-side and only a coarse category message reaches the client.

use crate::auth::AuthenticationFailure;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// PIA error type.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401 Unauthorized
/// - BadRequest: 400 Bad Request
/// - UpstreamUnavailable: 502 Bad Gateway
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum PiaError {
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthenticationFailure),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl PiaError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            PiaError::Unauthorized(_) => 401,
            PiaError::BadRequest(_) => 400,
            PiaError::UpstreamUnavailable(_) => 502,
            PiaError::Internal => 500,
        }
    }
}

/// Client-facing message for a denial.
fn unauthorized_message(failure: &AuthenticationFailure) -> &'static str {
    match failure {
        AuthenticationFailure::ProjectUnknown => "Project not allowed",
        AuthenticationFailure::MalformedToken => "Invalid token",
        AuthenticationFailure::UnknownIssuer => "Issuer not allowed",
        AuthenticationFailure::ClaimMismatch(_) => "Project token claim mismatch",
        AuthenticationFailure::DiscoveryError(_)
        | AuthenticationFailure::KeyNotFound
        | AuthenticationFailure::SignatureInvalid
        | AuthenticationFailure::TokenExpired
        | AuthenticationFailure::AudienceMismatch => "Token verification failed",
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for PiaError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            PiaError::Unauthorized(failure) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                unauthorized_message(failure).to_string(),
            ),
            PiaError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            PiaError::UpstreamUnavailable(reason) => {
                // Log actual reason server-side
                tracing::warn!(
                    target: "pia.upstream",
                    reason = %reason,
                    "DependencyTrack unavailable"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_UNAVAILABLE",
                    "Failed to upload to DependencyTrack".to_string(),
                )
            }
            PiaError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"pia\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
