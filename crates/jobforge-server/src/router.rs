// jobforge-server/src/router.rs
// ============================================================================
// Module: Router
// Description: Wires every handler to its RPC surface path.
// Purpose: The single place the worker protocol's endpoint list (spec.md 6)
//          is mapped to HTTP methods and paths.
// Dependencies: axum
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Router;
use axum::routing::get;
use axum::routing::post;

use crate::events;
use crate::jobs;
use crate::manifests;
use crate::state::AppState;
use crate::templates;

// ============================================================================
// SECTION: Build
// ============================================================================

/// Builds the full worker protocol API router over `state`.
#[must_use]
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/jobs", post(jobs::enqueue).get(jobs::list))
        .route("/jobs/claim", post(jobs::claim))
        .route("/jobs/{job_id}", get(jobs::get))
        .route("/jobs/{job_id}/heartbeat", post(jobs::heartbeat))
        .route("/jobs/{job_id}/complete", post(jobs::complete))
        .route("/jobs/{job_id}/cancel", post(jobs::cancel))
        .route("/jobs/{job_id}/reschedule", post(jobs::reschedule))
        .route("/jobs/{job_id}/result", get(jobs::get_result))
        .route("/events", post(events::submit).get(events::list))
        .route("/templates/request", post(templates::request_job))
        .route("/runs/{run_id}/manifest", get(manifests::get))
        .route("/runs/{run_id}/artifacts", get(manifests::list_artifacts))
        .with_state(state)
}
