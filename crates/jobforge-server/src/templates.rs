// jobforge-server/src/templates.rs
// ============================================================================
// Module: Template Compile Endpoint
// Description: The worker protocol's `RequestJob` endpoint.
// Purpose: Wire jobforge-policy's TemplateCompiler to the store handles and
//          schema registry held in AppState, gated by the
//          `autopilot_jobs_enabled` / `action_jobs_enabled` feature flags.
// Dependencies: axum, jobforge-core, jobforge-policy, serde, serde_json
// ============================================================================

//! ## Overview
//! [`RequestJobResult`](jobforge_policy::RequestJobResult) does not derive
//! `Serialize` - it is a plain domain type, not a wire type - so
//! [`RequestJobResponse`] is this crate's own serializable DTO over it.
//! `autopilot_jobs_enabled` gates every `RequestJob` call, since a template
//! is, per the glossary, "the sole way to create autopilot jobs";
//! `action_jobs_enabled` additionally gates calls against a template whose
//! `is_action_job` is true.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use jobforge_core::error::ApiError;
use jobforge_core::ids::ActorId;
use jobforge_core::ids::ProjectId;
use jobforge_core::ids::TenantId;
use jobforge_core::ids::TraceId;
use jobforge_core::job::Job;
use jobforge_core::store::TemplateRegistryStore;
use jobforge_policy::RequestJobParams;
use jobforge_policy::TemplateCompiler;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::respond;
use crate::state::AppState;
use crate::trace;
use crate::wire::require_feature;

// ============================================================================
// SECTION: Request Job
// ============================================================================

/// Request body for `POST /templates/request`.
#[derive(Debug, Deserialize)]
pub struct RequestJobRequest {
    tenant_id: String,
    template_key: String,
    inputs: Value,
    project_id: Option<String>,
    trace_id: Option<String>,
    actor_id: Option<String>,
    #[serde(default)]
    dry_run: bool,
    #[serde(default, with = "base64_token")]
    policy_token: Option<Vec<u8>>,
}

/// Base64 encoding for the optional raw policy token bytes.
mod base64_token {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom)).transpose()
    }
}

/// Response body for `POST /templates/request`.
#[derive(Debug, Serialize)]
pub struct RequestJobResponse {
    job: Option<Job>,
    trace_id: TraceId,
    audit_id: String,
    dry_run: bool,
}

/// `POST /templates/request` - `RequestJob`.
pub async fn request_job(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<RequestJobRequest>) -> Response {
    let trace_id = trace::resolve(&headers);
    let result = request_job_inner(&state, &trace_id, body);
    respond(&trace_id, result)
}

fn request_job_inner(state: &AppState, trace_id: &TraceId, body: RequestJobRequest) -> Result<RequestJobResponse, ApiError> {
    require_feature(state.features.autopilot_jobs_enabled, "autopilot jobs")?;

    let templates = state.store.templates();
    let template = templates.get_template(&body.template_key)?;
    if template.is_action_job {
        require_feature(state.features.action_jobs_enabled, "action jobs")?;
    }

    let jobs = state.store.jobs();
    let policy_tokens = state.store.policy_tokens();
    let audit_log = state.store.audit_log();
    let compiler = TemplateCompiler {
        templates: &templates,
        jobs: &jobs,
        policy_tokens: &policy_tokens,
        audit_log: &audit_log,
        schemas: &state.schemas,
    };

    let params = RequestJobParams {
        tenant_id: TenantId::new(body.tenant_id),
        template_key: body.template_key,
        inputs: body.inputs,
        project_id: body.project_id.map(ProjectId::new),
        trace_id: body.trace_id.map(TraceId::new).or_else(|| Some(trace_id.clone())),
        actor_id: body.actor_id.map(ActorId::new),
        dry_run: body.dry_run,
        policy_token: body.policy_token,
    };

    let result = compiler.request_job(params)?;
    Ok(RequestJobResponse {
        job: result.job,
        trace_id: result.trace_id,
        audit_id: result.audit_id,
        dry_run: result.dry_run,
    })
}
