// jobforge-server/src/manifests.rs
// ============================================================================
// Module: Manifest Endpoints
// Description: The worker protocol's run-manifest read surface.
// Purpose: Implement GetRunManifest and ListArtifacts, gated by the
//          `manifests_enabled` feature flag.
// Dependencies: axum, jobforge-core
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use jobforge_core::error::ApiError;
use jobforge_core::ids::TenantId;
use jobforge_core::manifest::Manifest;
use jobforge_core::manifest::ManifestOutput;
use jobforge_core::store::ManifestStore;
use serde::Deserialize;

use crate::error::respond;
use crate::state::AppState;
use crate::trace;
use crate::wire::parse_job_id;
use crate::wire::require_feature;

/// Query parameters shared by both manifest endpoints.
#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    tenant_id: String,
}

/// `GET /runs/:run_id/manifest` - `GetRunManifest`.
pub async fn get(State(state): State<AppState>, headers: HeaderMap, Path(run_id): Path<String>, Query(query): Query<TenantQuery>) -> Response {
    let trace_id = trace::resolve(&headers);
    let result = get_inner(&state, &run_id, &query.tenant_id);
    respond(&trace_id, result)
}

fn get_inner(state: &AppState, run_id: &str, tenant_id: &str) -> Result<Manifest, ApiError> {
    require_feature(state.features.manifests_enabled, "manifests")?;
    let run_id = parse_job_id(run_id)?;
    let tenant_id = TenantId::new(tenant_id);
    state.store.manifests().get_manifest(run_id, &tenant_id)
}

/// `GET /runs/:run_id/artifacts` - `ListArtifacts`.
pub async fn list_artifacts(State(state): State<AppState>, headers: HeaderMap, Path(run_id): Path<String>, Query(query): Query<TenantQuery>) -> Response {
    let trace_id = trace::resolve(&headers);
    let result = list_artifacts_inner(&state, &run_id, &query.tenant_id);
    respond(&trace_id, result)
}

fn list_artifacts_inner(state: &AppState, run_id: &str, tenant_id: &str) -> Result<Vec<ManifestOutput>, ApiError> {
    require_feature(state.features.manifests_enabled, "manifests")?;
    let run_id = parse_job_id(run_id)?;
    let tenant_id = TenantId::new(tenant_id);
    state.store.manifests().list_artifacts(run_id, &tenant_id)
}
