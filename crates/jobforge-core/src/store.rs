// jobforge-core/src/store.rs
// ============================================================================
// Module: JobForge Store Traits
// Description: Backend-agnostic persistence interfaces for the execution
//              plane.
// Purpose: Let jobforge-store-sqlite (and any future backend) implement a
//          stable contract without jobforge-core depending on a specific
//          storage engine.
// Dependencies: serde_json, crate::{audit, error, event, ids, job, manifest,
//               policy, template, time}
// ============================================================================

//! ## Overview
//! These traits describe exactly the operations named in the job queue,
//! event store, template registry, policy gate, and audit log components.
//! `jobforge-store-sqlite` is today's only implementation; the traits exist
//! so a second backend (e.g. a Postgres-backed store) can be substituted
//! without touching callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::audit::AuditAction;
use crate::audit::AuditLogEntry;
use crate::error::ApiError;
use crate::event::Event;
use crate::ids::EventId;
use crate::ids::JobId;
use crate::ids::TenantId;
use crate::ids::TraceId;
use crate::ids::WorkerId;
use crate::job::Job;
use crate::job::JobError;
use crate::job::JobOutcome;
use crate::job::JobResult;
use crate::manifest::Manifest;
use crate::policy::PolicyToken;
use crate::template::Template;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Job Queue
// ============================================================================

/// Filters accepted by [`JobStore::list_jobs`].
#[derive(Debug, Clone, Default)]
pub struct JobListFilters {
    /// Restrict to this job status, by its wire name (e.g. `"queued"`).
    pub status: Option<String>,
    /// Restrict to this job type.
    pub job_type: Option<String>,
    /// Maximum number of rows to return.
    pub limit: u32,
    /// Number of rows to skip before collecting `limit` rows.
    pub offset: u32,
}

/// Persistent operations over the job queue.
///
/// # Invariants
/// - Every method is tenant-scoped except [`claim_jobs`](Self::claim_jobs),
///   which by design spans tenants to implement cross-tenant fairness.
pub trait JobStore {
    /// Inserts a new job, or returns the existing row unmodified when
    /// `idempotency_key` collides with an existing `(tenant_id, type)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on validation or storage failure.
    fn enqueue(
        &self,
        tenant_id: &TenantId,
        job_type: &str,
        payload: Value,
        idempotency_key: Option<&str>,
        run_at: Option<Timestamp>,
        max_attempts: Option<i32>,
    ) -> Result<Job, ApiError>;

    /// Claims up to `limit` eligible jobs for `worker_id`, interleaving
    /// tenants so a single hot tenant cannot starve others.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on storage failure.
    fn claim_jobs(&self, worker_id: &WorkerId, limit: u32) -> Result<Vec<Job>, ApiError>;

    /// Records a heartbeat for `job_id`, transitioning `claimed -> running`
    /// on the first call and extending the lease on every call.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::not_owner`] if `worker_id` does not hold the
    /// claim, or [`ApiError::invalid_state`] if the job is terminal or
    /// cancelled.
    fn heartbeat(&self, job_id: JobId, worker_id: &WorkerId) -> Result<(), ApiError>;

    /// Marks a job terminal for this attempt, applying retry/dead-letter
    /// policy on failure.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::not_owner`] if `worker_id` does not hold the
    /// claim, or [`ApiError::invalid_state`] if the job is already terminal.
    fn complete_job(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        outcome: JobOutcome,
        error: Option<JobError>,
        result: Option<Value>,
        artifact_ref: Option<String>,
    ) -> Result<(), ApiError>;

    /// Cancels a job from `queued`, `claimed`, or `running`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::invalid_state`] if the job is already terminal.
    fn cancel_job(&self, job_id: JobId, tenant_id: &TenantId) -> Result<(), ApiError>;

    /// Reschedules a queued job's `run_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::invalid_state`] if the job is not queued.
    fn reschedule_job(&self, job_id: JobId, tenant_id: &TenantId, run_at: Timestamp) -> Result<(), ApiError>;

    /// Returns expired leases to `queued`. Safe to call repeatedly; a
    /// no-op when nothing has expired.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on storage failure.
    fn reap_expired_leases(&self, now: Timestamp) -> Result<u64, ApiError>;

    /// Tenant-scoped job listing.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on storage failure.
    fn list_jobs(&self, tenant_id: &TenantId, filters: &JobListFilters) -> Result<Vec<Job>, ApiError>;

    /// Fetches a single tenant-scoped job by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::not_found`] if no such job exists for the tenant.
    fn get_job(&self, job_id: JobId, tenant_id: &TenantId) -> Result<Job, ApiError>;

    /// Fetches the terminal result of a job, if it has completed.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::not_found`] if no result exists yet.
    fn get_result(&self, job_id: JobId, tenant_id: &TenantId) -> Result<JobResult, ApiError>;
}

// ============================================================================
// SECTION: Event Store
// ============================================================================

/// Filters accepted by [`EventStore::list_events`].
#[derive(Debug, Clone, Default)]
pub struct EventListFilters {
    /// Restrict to this event type.
    pub event_type: Option<String>,
    /// Restrict to this source application.
    pub source_app: Option<String>,
    /// Restrict to this processed state.
    pub processed: Option<bool>,
    /// Restrict to events at or after this time.
    pub since: Option<Timestamp>,
    /// Restrict to events strictly before this time.
    pub until: Option<Timestamp>,
    /// Maximum number of rows to return.
    pub limit: u32,
}

/// Persistent operations over the append-only event log.
pub trait EventStore {
    /// Validates and inserts an event, optionally enqueueing a processing
    /// job in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::validation`] when the payload exceeds the size
    /// limit or fields are missing.
    #[allow(clippy::too_many_arguments, reason = "mirrors the RPC's flat parameter list")]
    fn submit_event(
        &self,
        tenant_id: &TenantId,
        project_id: Option<&str>,
        event_version: i32,
        event_type: &str,
        occurred_at: Timestamp,
        trace_id: &TraceId,
        source_app: &str,
        source_module: Option<&str>,
        subject_type: Option<&str>,
        subject_id: Option<&str>,
        payload: Value,
        contains_pii: bool,
        redaction_hints: Vec<String>,
    ) -> Result<Event, ApiError>;

    /// Tenant-scoped event listing.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on storage failure.
    fn list_events(&self, tenant_id: &TenantId, filters: &EventListFilters) -> Result<Vec<Event>, ApiError>;

    /// Fetches a single event by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::not_found`] if no such event exists.
    fn get_event(&self, event_id: EventId, tenant_id: &TenantId) -> Result<Event, ApiError>;
}

// ============================================================================
// SECTION: Template Registry
// ============================================================================

/// Persistent operations over the template registry.
pub trait TemplateRegistryStore {
    /// Loads a template by key, regardless of its `enabled` flag.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] with [`crate::error::ErrorKind::TemplateNotFound`]
    /// if no such template is registered.
    fn get_template(&self, template_key: &str) -> Result<Template, ApiError>;

    /// Lists all registered templates.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on storage failure.
    fn list_templates(&self) -> Result<Vec<Template>, ApiError>;

    /// Registers or replaces a template definition.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on storage failure.
    fn put_template(&self, template: Template) -> Result<(), ApiError>;

    /// Enables or disables a template by key.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::not_found`] if no such template is registered.
    fn set_enabled(&self, template_key: &str, enabled: bool) -> Result<(), ApiError>;
}

// ============================================================================
// SECTION: Policy Token Store
// ============================================================================

/// Persistent operations over policy capability tokens.
pub trait PolicyTokenStore {
    /// Issues and persists a new policy token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on storage failure.
    fn issue_token(&self, token: PolicyToken) -> Result<(), ApiError>;

    /// Fetches a token by its raw bytes for validation.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::not_found`] if no such token exists.
    fn get_token(&self, token_bytes: &[u8]) -> Result<PolicyToken, ApiError>;

    /// Atomically marks a single-use token consumed. A no-op (but not an
    /// error) if the token is not single-use.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::conflict`] if the token was already consumed.
    fn mark_consumed(&self, token_bytes: &[u8], consumed_at: Timestamp) -> Result<(), ApiError>;
}

// ============================================================================
// SECTION: Audit Log
// ============================================================================

/// Append-only operations over the audit log.
pub trait AuditLogStore {
    /// Appends a new audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on storage failure.
    #[allow(clippy::too_many_arguments, reason = "mirrors the audit row's flat shape")]
    fn append(
        &self,
        tenant_id: &TenantId,
        actor_id: Option<&str>,
        action: AuditAction,
        subject_type: &str,
        subject_id: &str,
        trace_id: &TraceId,
        metadata: Value,
    ) -> Result<AuditLogEntry, ApiError>;

    /// Tenant-scoped audit log listing, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on storage failure.
    fn list(&self, tenant_id: &TenantId, limit: u32) -> Result<Vec<AuditLogEntry>, ApiError>;
}

// ============================================================================
// SECTION: Manifest Store
// ============================================================================

/// Persistent operations over run manifests.
pub trait ManifestStore {
    /// Inserts or replaces a run's manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on storage failure.
    fn put_manifest(&self, manifest: Manifest) -> Result<(), ApiError>;

    /// Fetches a tenant-scoped manifest by run id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::not_found`] if no such manifest exists.
    fn get_manifest(&self, run_id: JobId, tenant_id: &TenantId) -> Result<Manifest, ApiError>;

    /// Returns the output references recorded against a run's manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::not_found`] if no such manifest exists.
    fn list_artifacts(&self, run_id: JobId, tenant_id: &TenantId) -> Result<Vec<crate::manifest::ManifestOutput>, ApiError> {
        Ok(self.get_manifest(run_id, tenant_id)?.outputs)
    }
}
