// jobforge-server/src/events.rs
// ============================================================================
// Module: Event Ingestion Endpoints
// Description: The worker protocol's event-store half of the RPC surface.
// Purpose: Implement SubmitEvent and ListEvents, gated by the
//          `events_enabled` feature flag.
// Dependencies: axum, jobforge-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Both endpoints return `feature_disabled` when `events_enabled` is off,
//! before ever touching the store - matching spec.md 6's "a disabled
//! feature's endpoints return `feature_disabled`".

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use jobforge_core::ids::TenantId;
use jobforge_core::store::EventListFilters;
use jobforge_core::store::EventStore;
use jobforge_core::time::Timestamp;
use serde::Deserialize;
use serde_json::Value;

use crate::error::respond;
use crate::state::AppState;
use crate::trace;
use crate::wire::require_feature;

// ============================================================================
// SECTION: Submit
// ============================================================================

/// Request body for `POST /events`.
#[derive(Debug, Deserialize)]
pub struct SubmitEventRequest {
    tenant_id: String,
    project_id: Option<String>,
    #[serde(default = "default_event_version")]
    event_version: i32,
    event_type: String,
    occurred_at: Timestamp,
    source_app: String,
    source_module: Option<String>,
    subject_type: Option<String>,
    subject_id: Option<String>,
    payload: Value,
    #[serde(default)]
    contains_pii: bool,
    #[serde(default)]
    redaction_hints: Vec<String>,
}

const fn default_event_version() -> i32 {
    1
}

/// `POST /events` - `SubmitEvent`.
pub async fn submit(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<SubmitEventRequest>) -> Response {
    let trace_id = trace::resolve(&headers);
    if let Err(err) = require_feature(state.features.events_enabled, "events") {
        return respond::<()>(&trace_id, Err(err));
    }

    let tenant_id = TenantId::new(body.tenant_id);
    let result = state.store.events().submit_event(
        &tenant_id,
        body.project_id.as_deref(),
        body.event_version,
        &body.event_type,
        body.occurred_at,
        &trace_id,
        &body.source_app,
        body.source_module.as_deref(),
        body.subject_type.as_deref(),
        body.subject_id.as_deref(),
        body.payload,
        body.contains_pii,
        body.redaction_hints,
    );
    respond(&trace_id, result)
}

// ============================================================================
// SECTION: List
// ============================================================================

/// Query parameters for `GET /events`.
#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    tenant_id: String,
    event_type: Option<String>,
    source_app: Option<String>,
    processed: Option<bool>,
    since: Option<Timestamp>,
    until: Option<Timestamp>,
    #[serde(default = "default_limit")]
    limit: u32,
}

const fn default_limit() -> u32 {
    100
}

/// `GET /events` - `ListEvents`.
pub async fn list(State(state): State<AppState>, headers: HeaderMap, Query(query): Query<ListEventsQuery>) -> Response {
    let trace_id = trace::resolve(&headers);
    if let Err(err) = require_feature(state.features.events_enabled, "events") {
        return respond::<()>(&trace_id, Err(err));
    }

    let tenant_id = TenantId::new(query.tenant_id);
    let filters = EventListFilters {
        event_type: query.event_type,
        source_app: query.source_app,
        processed: query.processed,
        since: query.since,
        until: query.until,
        limit: query.limit,
    };
    let result = state.store.events().list_events(&tenant_id, &filters);
    respond(&trace_id, result)
}
