// jobforge-policy/src/compiler.rs
// ============================================================================
// Module: Template Compiler
// Description: Turns a RequestJob call into an enqueued job, or a
//              policy_denied/template error.
// Purpose: Implement RequestJob: template lookup, input validation, policy
//          gating for action jobs, idempotency-key derivation, audit entry.
// Dependencies: jobforge-core, jobforge-schema, crate::gate
// ============================================================================

//! ## Overview
//! `RequestJob` is the sole path to creating an autopilot job. It never
//! calls [`jobforge_core::store::JobStore::enqueue`] for an action job
//! whose policy token did not validate - the policy check happens before
//! any job row is written, matching spec.md's "never enqueued" guarantee
//! for denied action jobs.
//!
//! Input validation looks a template's `input_schema` up in the
//! [`SchemaRegistry`] under `(template_key, version)`; the caller (normally
//! `jobforge-server` at startup) is expected to have registered each
//! template's `input_schema` under that same key as it loads the registry.
//! A template with no matching registration validates permissively, so a
//! template added at runtime without a server restart still compiles.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jobforge_core::audit::AuditAction;
use jobforge_core::canon::HashAlgorithm;
use jobforge_core::canon::hash_canonical_json;
use jobforge_core::error::ApiError;
use jobforge_core::error::ErrorKind;
use jobforge_core::ids::ActorId;
use jobforge_core::ids::ProjectId;
use jobforge_core::ids::TenantId;
use jobforge_core::ids::TraceId;
use jobforge_core::job::Job;
use jobforge_core::store::AuditLogStore;
use jobforge_core::store::JobStore;
use jobforge_core::store::PolicyTokenStore;
use jobforge_core::store::TemplateRegistryStore;
use jobforge_core::template::Template;
use jobforge_core::time::Timestamp;
use jobforge_schema::SchemaRegistry;
use jobforge_schema::ValidationOutcome;
use serde_json::Value;
use uuid::Uuid;

use crate::gate::validate_policy_token;

// ============================================================================
// SECTION: Request Job
// ============================================================================

/// Parameters accepted by [`request_job`], mirroring the `RequestJob` RPC.
#[derive(Debug, Clone)]
pub struct RequestJobParams {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Template to compile against.
    pub template_key: String,
    /// Caller-supplied inputs, validated against the template's input schema.
    pub inputs: Value,
    /// Optional project scope.
    pub project_id: Option<ProjectId>,
    /// Caller-supplied trace id; generated if absent.
    pub trace_id: Option<TraceId>,
    /// Caller-supplied actor id, recorded on the audit entry.
    pub actor_id: Option<ActorId>,
    /// When true, no job is enqueued; the compiled job is synthetic.
    pub dry_run: bool,
    /// Raw policy token bytes, required when the template is an action job.
    pub policy_token: Option<Vec<u8>>,
}

/// Result of a successful or `dry_run` `RequestJob` call.
#[derive(Debug, Clone)]
pub struct RequestJobResult {
    /// The enqueued job, or a synthetic row (`id = None`) when `dry_run`.
    pub job: Option<Job>,
    /// The trace id assigned to this request (generated if the caller
    /// didn't supply one).
    pub trace_id: TraceId,
    /// Audit entry id recorded for this request.
    pub audit_id: String,
    /// Echoes the caller's `dry_run` flag.
    pub dry_run: bool,
}

/// Everything the compiler needs to turn a `RequestJob` call into state.
pub struct TemplateCompiler<'a> {
    /// Template registry handle.
    pub templates: &'a dyn TemplateRegistryStore,
    /// Job queue handle.
    pub jobs: &'a dyn JobStore,
    /// Policy token store handle.
    pub policy_tokens: &'a dyn PolicyTokenStore,
    /// Audit log handle.
    pub audit_log: &'a dyn AuditLogStore,
    /// Input-schema validator.
    pub schemas: &'a SchemaRegistry,
}

impl TemplateCompiler<'_> {
    /// Compiles and (unless `dry_run`) enqueues a job from `params`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] with [`ErrorKind::TemplateNotFound`] or
    /// [`ErrorKind::TemplateDisabled`] if the template does not resolve,
    /// [`ApiError::validation`] if `inputs` fails schema validation, and
    /// [`ApiError::policy_denied`] if the template is an action job and the
    /// policy token is missing or fails to validate.
    pub fn request_job(&self, params: RequestJobParams) -> Result<RequestJobResult, ApiError> {
        let template = self.templates.get_template(&params.template_key)?;
        if !template.enabled {
            return Err(ApiError::new(ErrorKind::TemplateDisabled, format!("template {} is disabled", params.template_key)));
        }

        self.validate_inputs(&template, &params.inputs)?;

        let trace_id = params.trace_id.clone().unwrap_or_else(|| TraceId::new(Uuid::new_v4().to_string()));

        if template.requires_policy_token() {
            if let Err(err) = self.authorize_action_job(&template, &params, &trace_id) {
                self.record_audit(
                    &params,
                    &trace_id,
                    AuditAction::PolicyDenied,
                    &params.template_key,
                    Value::Null,
                )?;
                return Err(err);
            }
        }

        let audit_entry = self.record_audit(
            &params,
            &trace_id,
            AuditAction::JobRequested,
            &params.template_key,
            params.inputs.clone(),
        )?;

        if params.dry_run {
            return Ok(RequestJobResult {
                job: None,
                trace_id,
                audit_id: audit_entry,
                dry_run: true,
            });
        }

        let idempotency_key = Self::idempotency_key(&params.template_key, &params.tenant_id, &params.inputs, &trace_id)?;
        let job = self.jobs.enqueue(
            &params.tenant_id,
            &params.template_key,
            params.inputs.clone(),
            Some(idempotency_key.as_str()),
            None,
            Some(template.default_max_attempts),
        )?;

        Ok(RequestJobResult {
            job: Some(job),
            trace_id,
            audit_id: audit_entry,
            dry_run: false,
        })
    }

    /// Validates `inputs` against the template's `input_schema`.
    fn validate_inputs(&self, template: &Template, inputs: &Value) -> Result<(), ApiError> {
        let version = u32::try_from(template.version).unwrap_or(1);
        match self.schemas.validate(&template.template_key, version, inputs) {
            Ok(ValidationOutcome::Valid) => Ok(()),
            Ok(ValidationOutcome::Invalid(failure)) => Err(ApiError::validation(failure.errors.join("; "))),
            // A template with no registered schema accepts any input shape.
            Err(jobforge_schema::SchemaError::NotRegistered { .. }) => Ok(()),
            Err(err) => Err(ApiError::internal(err.to_string())),
        }
    }

    /// Validates the policy token required by an action-job template.
    fn authorize_action_job(&self, template: &Template, params: &RequestJobParams, trace_id: &TraceId) -> Result<(), ApiError> {
        let Some(token_bytes) = params.policy_token.as_deref() else {
            return Err(ApiError::policy_denied("action job requires a policy token").with_trace_id(trace_id.clone()));
        };
        validate_policy_token(self.policy_tokens, token_bytes, &params.tenant_id, &template.required_scopes, Timestamp::now())
            .map_err(|err| err.with_trace_id(trace_id.clone()))?;
        Ok(())
    }

    /// Derives `hash(template_key, tenant_id, canonical(inputs), trace_id)`.
    fn idempotency_key(template_key: &str, tenant_id: &TenantId, inputs: &Value, trace_id: &TraceId) -> Result<String, ApiError> {
        let composite = serde_json::json!({
            "template_key": template_key,
            "tenant_id": tenant_id.as_str(),
            "inputs": inputs,
            "trace_id": trace_id.as_str(),
        });
        let digest = hash_canonical_json(HashAlgorithm::Sha256, &composite).map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(digest.value)
    }

    /// Writes an audit entry for this request, returning its id.
    fn record_audit(
        &self,
        params: &RequestJobParams,
        trace_id: &TraceId,
        action: AuditAction,
        subject_id: &str,
        metadata: Value,
    ) -> Result<String, ApiError> {
        let entry = self.audit_log.append(
            &params.tenant_id,
            params.actor_id.as_ref().map(ActorId::as_str),
            action,
            "template",
            subject_id,
            trace_id,
            metadata,
        )?;
        Ok(entry.id)
    }
}

#[cfg(test)]
mod tests {
    use jobforge_core::error::ErrorKind;
    use jobforge_core::ids::TenantId;
    use jobforge_core::policy::PolicyToken;
    use jobforge_core::store::AuditLogStore;
    use jobforge_core::store::PolicyTokenStore;
    use jobforge_core::store::TemplateRegistryStore;
    use jobforge_core::template::CostTier;
    use jobforge_core::template::Template;
    use jobforge_core::template::TemplateCategory;
    use jobforge_core::time::Timestamp;
    use jobforge_schema::SchemaRegistry;
    use jobforge_store_sqlite::QueueTunables;
    use jobforge_store_sqlite::SqliteStore;
    use serde_json::json;

    use super::RequestJobParams;
    use super::TemplateCompiler;

    fn ops_template(is_action_job: bool) -> Template {
        Template {
            template_key: "ops.echo".to_string(),
            version: 1,
            category: TemplateCategory::Ops,
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            required_scopes: vec!["autopilot.ops.apply".to_string()],
            required_connectors: vec![],
            estimated_cost_tier: CostTier::Low,
            default_max_attempts: 5,
            default_timeout_ms: 30_000,
            is_action_job,
            enabled: true,
        }
    }

    fn params(template_key: &str, policy_token: Option<Vec<u8>>) -> RequestJobParams {
        RequestJobParams {
            tenant_id: TenantId::new("acme"),
            template_key: template_key.to_string(),
            inputs: json!({"v": 1}),
            project_id: None,
            trace_id: None,
            actor_id: None,
            dry_run: false,
            policy_token,
        }
    }

    #[test]
    fn non_action_template_enqueues_without_a_token() {
        let store = SqliteStore::open_in_memory(QueueTunables::default()).expect("open");
        store.templates().put_template(ops_template(false)).expect("seed template");
        let schemas = SchemaRegistry::new();
        let compiler = TemplateCompiler {
            templates: &store.templates(),
            jobs: &store.jobs(),
            policy_tokens: &store.policy_tokens(),
            audit_log: &store.audit_log(),
            schemas: &schemas,
        };

        let result = compiler.request_job(params("ops.echo", None)).expect("request job");
        assert!(result.job.is_some());
        assert!(!result.dry_run);
    }

    #[test]
    fn action_job_without_token_is_denied_and_not_enqueued() {
        let store = SqliteStore::open_in_memory(QueueTunables::default()).expect("open");
        store.templates().put_template(ops_template(true)).expect("seed template");
        let schemas = SchemaRegistry::new();
        let compiler = TemplateCompiler {
            templates: &store.templates(),
            jobs: &store.jobs(),
            policy_tokens: &store.policy_tokens(),
            audit_log: &store.audit_log(),
            schemas: &schemas,
        };

        let result = compiler.request_job(params("ops.echo", None));
        let err = result.expect_err("expected policy_denied");
        assert_eq!(err.kind, ErrorKind::PolicyDenied);

        let tenant = TenantId::new("acme");
        assert!(store.jobs().list_jobs(&tenant, &Default::default()).expect("list").is_empty());
        let audit_rows = store.audit_log().list(&tenant, 10).expect("list audit");
        assert_eq!(audit_rows.len(), 1);
        assert_eq!(audit_rows[0].action, jobforge_core::audit::AuditAction::PolicyDenied);
    }

    #[test]
    fn action_job_with_valid_token_enqueues() {
        let store = SqliteStore::open_in_memory(QueueTunables::default()).expect("open");
        store.templates().put_template(ops_template(true)).expect("seed template");
        let now = Timestamp::now();
        store
            .policy_tokens()
            .issue_token(PolicyToken {
                token: b"secret".to_vec(),
                tenant_id: TenantId::new("acme"),
                scopes: vec!["autopilot.ops.apply".to_string()],
                issued_at: now,
                expires_at: now.plus_millis(60_000),
                single_use: true,
                consumed_at: None,
            })
            .expect("issue token");
        let schemas = SchemaRegistry::new();
        let compiler = TemplateCompiler {
            templates: &store.templates(),
            jobs: &store.jobs(),
            policy_tokens: &store.policy_tokens(),
            audit_log: &store.audit_log(),
            schemas: &schemas,
        };

        let result = compiler
            .request_job(params("ops.echo", Some(b"secret".to_vec())))
            .expect("request job");
        assert!(result.job.is_some());
    }

    #[test]
    fn dry_run_enqueues_nothing() {
        let store = SqliteStore::open_in_memory(QueueTunables::default()).expect("open");
        store.templates().put_template(ops_template(false)).expect("seed template");
        let schemas = SchemaRegistry::new();
        let compiler = TemplateCompiler {
            templates: &store.templates(),
            jobs: &store.jobs(),
            policy_tokens: &store.policy_tokens(),
            audit_log: &store.audit_log(),
            schemas: &schemas,
        };

        let mut request = params("ops.echo", None);
        request.dry_run = true;
        let result = compiler.request_job(request).expect("request job");
        assert!(result.job.is_none());
        assert!(result.dry_run);

        let tenant = TenantId::new("acme");
        assert!(store.jobs().list_jobs(&tenant, &Default::default()).expect("list").is_empty());
    }

    #[test]
    fn unknown_template_is_not_found() {
        let store = SqliteStore::open_in_memory(QueueTunables::default()).expect("open");
        let schemas = SchemaRegistry::new();
        let compiler = TemplateCompiler {
            templates: &store.templates(),
            jobs: &store.jobs(),
            policy_tokens: &store.policy_tokens(),
            audit_log: &store.audit_log(),
            schemas: &schemas,
        };

        let err = compiler.request_job(params("missing.key", None)).expect_err("expected error");
        assert_eq!(err.kind, ErrorKind::TemplateNotFound);
    }

    #[test]
    fn disabled_template_is_rejected() {
        let store = SqliteStore::open_in_memory(QueueTunables::default()).expect("open");
        let mut template = ops_template(false);
        template.enabled = false;
        store.templates().put_template(template).expect("seed template");
        let schemas = SchemaRegistry::new();
        let compiler = TemplateCompiler {
            templates: &store.templates(),
            jobs: &store.jobs(),
            policy_tokens: &store.policy_tokens(),
            audit_log: &store.audit_log(),
            schemas: &schemas,
        };

        let err = compiler.request_job(params("ops.echo", None)).expect_err("expected error");
        assert_eq!(err.kind, ErrorKind::TemplateDisabled);
    }
}
