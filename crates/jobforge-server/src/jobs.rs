// jobforge-server/src/jobs.rs
// ============================================================================
// Module: Job Queue Endpoints
// Description: The worker protocol's job-queue half of the RPC surface.
// Purpose: Implement EnqueueJob, ClaimJobs, HeartbeatJob, CompleteJob,
//          CancelJob, RescheduleJob, ListJobs, GetJob, GetResult.
// Dependencies: axum, jobforge-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every handler here is a thin wrapper over [`jobforge_core::store::JobStore`]:
//! parse the request, resolve the trace id, call the store, and hand the
//! result to [`crate::error::respond`]. `HeartbeatJob` is the one exception -
//! on `invalid_state` it re-checks whether the job is `cancelled` and, if so,
//! reports that as a normal (non-error) response body, matching spec.md's
//! "conventional `not_owner` equivalent, `cancelled`" heartbeat signal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use jobforge_core::error::ApiError;
use jobforge_core::error::ErrorKind;
use jobforge_core::ids::JobId;
use jobforge_core::ids::TenantId;
use jobforge_core::ids::WorkerId;
use jobforge_core::job::Job;
use jobforge_core::job::JobError;
use jobforge_core::job::JobOutcome;
use jobforge_core::job::JobResult;
use jobforge_core::job::JobStatus;
use jobforge_core::store::JobListFilters;
use jobforge_core::store::JobStore;
use jobforge_core::time::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::respond;
use crate::state::AppState;
use crate::trace;
use crate::wire::parse_job_id;

// ============================================================================
// SECTION: Enqueue
// ============================================================================

/// Request body for `POST /jobs`.
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    tenant_id: String,
    #[serde(rename = "type")]
    job_type: String,
    payload: Value,
    idempotency_key: Option<String>,
    run_at: Option<Timestamp>,
    max_attempts: Option<i32>,
}

/// `POST /jobs` - `EnqueueJob`.
pub async fn enqueue(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<EnqueueRequest>) -> Response {
    let trace_id = trace::resolve(&headers);
    let tenant_id = TenantId::new(body.tenant_id);
    let result = state.store.jobs().enqueue(
        &tenant_id,
        &body.job_type,
        body.payload,
        body.idempotency_key.as_deref(),
        body.run_at,
        body.max_attempts,
    );
    respond(&trace_id, result)
}

// ============================================================================
// SECTION: Claim
// ============================================================================

/// Request body for `POST /jobs/claim`.
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    worker_id: String,
    limit: u32,
}

/// `POST /jobs/claim` - `ClaimJobs`.
pub async fn claim(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<ClaimRequest>) -> Response {
    let trace_id = trace::resolve(&headers);
    let worker_id = WorkerId::new(body.worker_id);
    let result = state.store.jobs().claim_jobs(&worker_id, body.limit);
    respond(&trace_id, result)
}

// ============================================================================
// SECTION: Heartbeat
// ============================================================================

/// Request body for `POST /jobs/:job_id/heartbeat`.
///
/// `tenant_id` is not part of spec.md's literal `HeartbeatJob` request
/// columns, but 4.K requires every worker RPC to validate tenant scoping;
/// it also lets this handler distinguish a cancelled job from any other
/// terminal state below.
#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    worker_id: String,
    tenant_id: String,
}

/// Response body for a successful heartbeat.
#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    status: &'static str,
}

/// `POST /jobs/:job_id/heartbeat` - `HeartbeatJob`.
///
/// On `invalid_state`, re-checks whether the job is `cancelled`; if so,
/// reports `{"status":"cancelled"}` as a normal response rather than an
/// error, since a cancelled job is the worker's cue to stop, not a failure.
pub async fn heartbeat(State(state): State<AppState>, headers: HeaderMap, Path(job_id): Path<String>, Json(body): Json<HeartbeatRequest>) -> Response {
    let trace_id = trace::resolve(&headers);
    let worker_id = WorkerId::new(body.worker_id);
    let tenant_id = TenantId::new(body.tenant_id);

    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(err) => return respond::<()>(&trace_id, Err(err)),
    };

    match state.store.jobs().heartbeat(job_id, &worker_id) {
        Ok(()) => respond(&trace_id, Ok(HeartbeatResponse { status: "ok" })),
        Err(err) if err.kind == ErrorKind::InvalidState && job_is_cancelled(&state, job_id, &tenant_id) => {
            respond(&trace_id, Ok(HeartbeatResponse { status: "cancelled" }))
        }
        Err(err) => respond::<HeartbeatResponse>(&trace_id, Err(err)),
    }
}

/// Confirms a job's terminal state is specifically `cancelled`, since the
/// store reports every terminal state through the same `invalid_state`
/// message.
fn job_is_cancelled(state: &AppState, job_id: JobId, tenant_id: &TenantId) -> bool {
    state
        .store
        .jobs()
        .get_job(job_id, tenant_id)
        .is_ok_and(|job| job.status == JobStatus::Cancelled)
}

// ============================================================================
// SECTION: Complete
// ============================================================================

/// Request body for `POST /jobs/:job_id/complete`.
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    worker_id: String,
    status: JobOutcome,
    error: Option<JobError>,
    result: Option<Value>,
    artifact_ref: Option<String>,
}

/// `POST /jobs/:job_id/complete` - `CompleteJob`.
pub async fn complete(State(state): State<AppState>, headers: HeaderMap, Path(job_id): Path<String>, Json(body): Json<CompleteRequest>) -> Response {
    let trace_id = trace::resolve(&headers);
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(err) => return respond::<()>(&trace_id, Err(err)),
    };
    let worker_id = WorkerId::new(body.worker_id);
    let result = state
        .store
        .jobs()
        .complete_job(job_id, &worker_id, body.status, body.error, body.result, body.artifact_ref);
    respond(&trace_id, result.map(|()| serde_json::json!({})))
}

// ============================================================================
// SECTION: Cancel & Reschedule
// ============================================================================

/// Request body for `POST /jobs/:job_id/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    tenant_id: String,
}

/// `POST /jobs/:job_id/cancel` - `CancelJob`.
pub async fn cancel(State(state): State<AppState>, headers: HeaderMap, Path(job_id): Path<String>, Json(body): Json<CancelRequest>) -> Response {
    let trace_id = trace::resolve(&headers);
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(err) => return respond::<()>(&trace_id, Err(err)),
    };
    let tenant_id = TenantId::new(body.tenant_id);
    let result = state.store.jobs().cancel_job(job_id, &tenant_id);
    respond(&trace_id, result.map(|()| serde_json::json!({})))
}

/// Request body for `POST /jobs/:job_id/reschedule`.
#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    tenant_id: String,
    run_at: Timestamp,
}

/// `POST /jobs/:job_id/reschedule` - `RescheduleJob`.
pub async fn reschedule(State(state): State<AppState>, headers: HeaderMap, Path(job_id): Path<String>, Json(body): Json<RescheduleRequest>) -> Response {
    let trace_id = trace::resolve(&headers);
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(err) => return respond::<()>(&trace_id, Err(err)),
    };
    let tenant_id = TenantId::new(body.tenant_id);
    let result = state.store.jobs().reschedule_job(job_id, &tenant_id, body.run_at);
    respond(&trace_id, result.map(|()| serde_json::json!({})))
}

// ============================================================================
// SECTION: List & Get
// ============================================================================

/// Query parameters for `GET /jobs`.
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    tenant_id: String,
    status: Option<String>,
    #[serde(rename = "type")]
    job_type: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

const fn default_limit() -> u32 {
    100
}

/// `GET /jobs` - `ListJobs`.
pub async fn list(State(state): State<AppState>, headers: HeaderMap, Query(query): Query<ListJobsQuery>) -> Response {
    let trace_id = trace::resolve(&headers);
    let tenant_id = TenantId::new(query.tenant_id);
    let filters = JobListFilters {
        status: query.status,
        job_type: query.job_type,
        limit: query.limit,
        offset: query.offset,
    };
    let result = state.store.jobs().list_jobs(&tenant_id, &filters);
    respond(&trace_id, result)
}

/// Query parameters shared by the single-job lookups.
#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    tenant_id: String,
}

/// `GET /jobs/:job_id` - `GetJob`.
pub async fn get(State(state): State<AppState>, headers: HeaderMap, Path(job_id): Path<String>, Query(query): Query<TenantQuery>) -> Response {
    let trace_id = trace::resolve(&headers);
    let result = get_job_inner(&state, &job_id, &query.tenant_id);
    respond(&trace_id, result)
}

fn get_job_inner(state: &AppState, job_id: &str, tenant_id: &str) -> Result<Job, ApiError> {
    let job_id = parse_job_id(job_id)?;
    let tenant_id = TenantId::new(tenant_id);
    state.store.jobs().get_job(job_id, &tenant_id)
}

/// `GET /jobs/:job_id/result` - `GetResult`.
pub async fn get_result(State(state): State<AppState>, headers: HeaderMap, Path(job_id): Path<String>, Query(query): Query<TenantQuery>) -> Response {
    let trace_id = trace::resolve(&headers);
    let result = get_result_inner(&state, &job_id, &query.tenant_id);
    respond(&trace_id, result)
}

fn get_result_inner(state: &AppState, job_id: &str, tenant_id: &str) -> Result<JobResult, ApiError> {
    let job_id = parse_job_id(job_id)?;
    let tenant_id = TenantId::new(tenant_id);
    state.store.jobs().get_result(job_id, &tenant_id)
}
