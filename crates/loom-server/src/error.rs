// crates/loom-server/src/error.rs
// ============================================================================
// Module: Server Error Mapping
// Description: Maps orchestration service errors onto HTTP responses.
// Purpose: Keep the status-code contract bit-exact for migrators and console.
// Dependencies: axum, loom-core, serde_json
// ============================================================================

//! ## Overview
//! Typed service errors map onto the fixed status-code contract: 404 for
//! not-found (including unparseable run ids), 409 for lifecycle conflicts,
//! 400 for validation failures, and 500 for backend errors. Backend error
//! bodies are generic; detail stays in the audit log.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use loom_core::ServiceError;
use serde_json::json;

// ============================================================================
// SECTION: API Error
// ============================================================================

/// Service error wrapper carrying the HTTP mapping.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl ApiError {
    /// Returns the HTTP status for the wrapped error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::MigrationNotFound(_)
            | ServiceError::CandidateNotFound(_)
            | ServiceError::RunNotFound(_)
            | ServiceError::InvalidRunId(_) => StatusCode::NOT_FOUND,
            ServiceError::CandidateAlreadyRun(_) | ServiceError::CandidateNotRunning(_) => {
                StatusCode::CONFLICT
            }
            ServiceError::MissingRequiredInputs { .. } | ServiceError::InvalidCandidate(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Registry(_)
            | ServiceError::Engine(_)
            | ServiceError::DryRun(_)
            | ServiceError::Events(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.0 {
            ServiceError::MissingRequiredInputs {
                missing,
            } => json!({
                "error": "missing required inputs",
                "missing": missing,
            }),
            // Backend failures surface generically; detail goes to the audit log.
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                json!({ "error": "internal server error" })
            }
            err => json!({ "error": err.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
