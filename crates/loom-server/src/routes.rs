// crates/loom-server/src/routes.rs
// ============================================================================
// Module: Server Routes
// Description: HTTP route table and handlers for the orchestration service.
// Purpose: Map the fixed route contract onto service operations.
// Dependencies: axum, loom-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The route table is bit-exact to the contract migrators and the console
//! depend on. Handlers are thin: parse path and body, call the single
//! canonical service method, map the result through [`ApiError`], and stamp
//! the correlation header (the run id on run-scoped routes).
//!
//! Security posture: request bodies are untrusted and bounded by the
//! server-wide body limit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use loom_core::Candidate;
use loom_core::CandidateId;
use loom_core::MigrationAnnouncement;
use loom_core::MigrationId;
use loom_core::RunId;
use loom_core::ServiceError;
use loom_core::StepName;
use loom_core::StepStatusEvent;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditEvent;
use crate::correlation::SERVER_CORRELATION_HEADER;
use crate::correlation::next_request_id;
use crate::error::ApiError;
use crate::state::ServerState;
use crate::telemetry::RequestMetricEvent;
use crate::telemetry::RequestOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default trailing window for the metrics timeline, in days.
const DEFAULT_TIMELINE_DAYS: u16 = 14;
/// Default number of records returned by the failures read.
const DEFAULT_FAILURES_LIMIT: usize = 20;

// ============================================================================
// SECTION: Request Payloads
// ============================================================================

/// Body of a candidate start request.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartRequest {
    /// Operator-supplied inputs merged into candidate metadata.
    pub inputs: BTreeMap<String, String>,
}

/// Body of a step retry request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStepRequest {
    /// Step to re-dispatch.
    pub step_name: StepName,
}

/// Common metrics query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsQuery {
    /// Optional migration scope.
    pub migration_id: Option<String>,
}

/// Timeline query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineQuery {
    /// Optional migration scope.
    pub migration_id: Option<String>,
    /// Trailing window in days.
    pub days: Option<u16>,
}

/// Failures query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FailuresQuery {
    /// Optional migration scope.
    pub migration_id: Option<String>,
    /// Maximum records returned.
    pub limit: Option<usize>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the application router over the shared server state.
#[must_use]
pub fn router(state: Arc<ServerState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/registry/announce", post(handle_announce))
        .route("/migrations", get(handle_list))
        .route("/migrations/{id}", get(handle_get))
        .route(
            "/migrations/{id}/candidates",
            post(handle_submit_candidates).get(handle_get_candidates),
        )
        .route("/migrations/{id}/dry-run", post(handle_dry_run))
        .route("/migrations/{id}/candidates/{cid}/start", post(handle_start))
        .route("/migrations/{id}/candidates/{cid}/cancel", post(handle_cancel))
        .route("/migrations/{id}/candidates/{cid}/retry-step", post(handle_retry_step))
        .route("/migrations/{id}/candidates/{cid}/steps", get(handle_candidate_steps))
        .route("/event/{run_id}", post(handle_event))
        .route("/metrics/overview", get(handle_metrics_overview))
        .route("/metrics/steps", get(handle_metrics_steps))
        .route("/metrics/timeline", get(handle_metrics_timeline))
        .route("/metrics/failures", get(handle_metrics_failures))
        .route("/health", get(handle_health))
        .route("/ready", get(handle_ready))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

// ============================================================================
// SECTION: Response Finalization
// ============================================================================

/// Stamps the correlation header and records telemetry for a response.
fn finalize(
    state: &ServerState,
    route: &'static str,
    correlation: Option<String>,
    mut response: Response,
) -> Response {
    let correlation = correlation.unwrap_or_else(next_request_id);
    if let Ok(value) = HeaderValue::from_str(&correlation) {
        response.headers_mut().insert(SERVER_CORRELATION_HEADER, value);
    }
    let status = response.status().as_u16();
    state.metrics.record_request(RequestMetricEvent {
        route,
        status,
        outcome: RequestOutcome::from_status(status),
    });
    state.audit.record(&AuditEvent::request(route, status, Some(correlation)));
    response
}

/// Maps a service result onto a JSON 200 response.
fn ok_json<T: serde::Serialize>(result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Maps a service result onto an empty response with the given status.
fn empty(result: Result<(), ServiceError>, status: StatusCode) -> Response {
    match result {
        Ok(()) => status.into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

// ============================================================================
// SECTION: Registry Handlers
// ============================================================================

/// POST `/registry/announce`.
async fn handle_announce(
    State(state): State<Arc<ServerState>>,
    Json(announcement): Json<MigrationAnnouncement>,
) -> Response {
    let response = ok_json(state.service.announce(announcement));
    finalize(&state, "announce", None, response)
}

/// GET `/migrations`.
async fn handle_list(State(state): State<Arc<ServerState>>) -> Response {
    let response = ok_json(state.service.list());
    finalize(&state, "list_migrations", None, response)
}

/// GET `/migrations/{id}`.
async fn handle_get(State(state): State<Arc<ServerState>>, Path(id): Path<String>) -> Response {
    let migration_id = MigrationId::new(id);
    let response = match state.service.get(&migration_id) {
        Ok(Some(migration)) => (StatusCode::OK, Json(migration)).into_response(),
        Ok(None) => {
            ApiError::from(ServiceError::MigrationNotFound(migration_id.to_string()))
                .into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    };
    finalize(&state, "get_migration", None, response)
}

/// POST `/migrations/{id}/candidates`.
async fn handle_submit_candidates(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(candidates): Json<Vec<Candidate>>,
) -> Response {
    let migration_id = MigrationId::new(id);
    let response = empty(
        state.service.submit_candidates(&migration_id, candidates),
        StatusCode::NO_CONTENT,
    );
    finalize(&state, "submit_candidates", None, response)
}

/// GET `/migrations/{id}/candidates`.
async fn handle_get_candidates(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Response {
    let migration_id = MigrationId::new(id);
    let response = ok_json(state.service.get_candidates(&migration_id));
    finalize(&state, "get_candidates", None, response)
}

/// POST `/migrations/{id}/dry-run`.
async fn handle_dry_run(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(candidate): Json<Candidate>,
) -> Response {
    let migration_id = MigrationId::new(id);
    let response = ok_json(state.service.dry_run(&migration_id, candidate).await);
    finalize(&state, "dry_run", None, response)
}

// ============================================================================
// SECTION: Lifecycle Handlers
// ============================================================================

/// POST `/migrations/{id}/candidates/{cid}/start`.
async fn handle_start(
    State(state): State<Arc<ServerState>>,
    Path((id, cid)): Path<(String, String)>,
    body: Option<Json<StartRequest>>,
) -> Response {
    let migration_id = MigrationId::new(id);
    let candidate_id = CandidateId::new(cid);
    let correlation = format!("{migration_id}__{candidate_id}");
    let inputs = body.map(|Json(request)| request.inputs).unwrap_or_default();
    let response = match state.service.start(&migration_id, &candidate_id, inputs).await {
        Ok(run_id) => (StatusCode::ACCEPTED, Json(json!({ "runId": run_id }))).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    };
    finalize(&state, "start_candidate", Some(correlation), response)
}

/// POST `/migrations/{id}/candidates/{cid}/cancel`.
async fn handle_cancel(
    State(state): State<Arc<ServerState>>,
    Path((id, cid)): Path<(String, String)>,
) -> Response {
    let migration_id = MigrationId::new(id);
    let candidate_id = CandidateId::new(cid);
    let correlation = format!("{migration_id}__{candidate_id}");
    let response = empty(
        state.service.cancel(&migration_id, &candidate_id).await,
        StatusCode::NO_CONTENT,
    );
    finalize(&state, "cancel_candidate", Some(correlation), response)
}

/// POST `/migrations/{id}/candidates/{cid}/retry-step`.
async fn handle_retry_step(
    State(state): State<Arc<ServerState>>,
    Path((id, cid)): Path<(String, String)>,
    Json(request): Json<RetryStepRequest>,
) -> Response {
    let migration_id = MigrationId::new(id);
    let candidate_id = CandidateId::new(cid);
    let correlation = format!("{migration_id}__{candidate_id}");
    let response = empty(
        state.service.retry_step(&migration_id, &candidate_id, &request.step_name).await,
        StatusCode::ACCEPTED,
    );
    finalize(&state, "retry_step", Some(correlation), response)
}

/// GET `/migrations/{id}/candidates/{cid}/steps`.
async fn handle_candidate_steps(
    State(state): State<Arc<ServerState>>,
    Path((id, cid)): Path<(String, String)>,
) -> Response {
    let migration_id = MigrationId::new(id);
    let candidate_id = CandidateId::new(cid);
    let correlation = format!("{migration_id}__{candidate_id}");
    let response = ok_json(state.service.candidate_steps(&migration_id, &candidate_id).await);
    finalize(&state, "candidate_steps", Some(correlation), response)
}

/// POST `/event/{runId}`.
async fn handle_event(
    State(state): State<Arc<ServerState>>,
    Path(run_id): Path<String>,
    Json(event): Json<StepStatusEvent>,
) -> Response {
    let correlation = run_id.clone();
    let response = match RunId::parse(&run_id) {
        Ok(run_id) => empty(
            state.service.handle_event(&run_id, event).await,
            StatusCode::ACCEPTED,
        ),
        Err(err) => ApiError::from(ServiceError::from(err)).into_response(),
    };
    finalize(&state, "handle_event", Some(correlation), response)
}

// ============================================================================
// SECTION: Metrics Handlers
// ============================================================================

/// Parses the optional migration scope of a metrics query.
fn migration_scope(raw: Option<String>) -> Option<MigrationId> {
    raw.map(MigrationId::new)
}

/// GET `/metrics/overview`.
async fn handle_metrics_overview(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    let scope = migration_scope(query.migration_id);
    let response = ok_json(state.service.metrics_overview(scope.as_ref()));
    finalize(&state, "metrics_overview", None, response)
}

/// GET `/metrics/steps`.
async fn handle_metrics_steps(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    let scope = migration_scope(query.migration_id);
    let response = ok_json(state.service.metrics_steps(scope.as_ref()));
    finalize(&state, "metrics_steps", None, response)
}

/// GET `/metrics/timeline`.
async fn handle_metrics_timeline(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<TimelineQuery>,
) -> Response {
    let scope = migration_scope(query.migration_id);
    let days = query.days.unwrap_or(DEFAULT_TIMELINE_DAYS);
    let response = ok_json(state.service.metrics_timeline(scope.as_ref(), days));
    finalize(&state, "metrics_timeline", None, response)
}

/// GET `/metrics/failures`.
async fn handle_metrics_failures(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<FailuresQuery>,
) -> Response {
    let scope = migration_scope(query.migration_id);
    let limit = query.limit.unwrap_or(DEFAULT_FAILURES_LIMIT);
    let response = ok_json(state.service.metrics_failures(scope.as_ref(), limit));
    finalize(&state, "metrics_failures", None, response)
}

// ============================================================================
// SECTION: Probe Handlers
// ============================================================================

/// GET `/health`.
async fn handle_health(State(state): State<Arc<ServerState>>) -> Response {
    let response = (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response();
    finalize(&state, "health", None, response)
}

/// GET `/ready`.
async fn handle_ready(State(state): State<Arc<ServerState>>) -> Response {
    let response = match state.service.readiness() {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response(),
        Err(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "unavailable" })))
                .into_response()
        }
    };
    finalize(&state, "ready", None, response)
}
