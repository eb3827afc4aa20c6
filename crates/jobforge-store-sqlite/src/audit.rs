// jobforge-store-sqlite/src/audit.rs
// ============================================================================
// Module: SQLite Audit Log
// Description: The append-only, tenant-scoped admin-visible event record.
// Purpose: Implement jobforge_core::store::AuditLogStore against a single
//          SQLite connection.
// Dependencies: jobforge-core (redact, store), rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Audit rows are inserted and never updated. Row ids are UUIDs minted here
//! rather than accepted from the caller, so every audited action gets a
//! fresh identifier regardless of what the caller's own job/event id is.
//! `metadata` is run through [`Redactor`] before it is serialized, so a
//! caller that accidentally passes a secret-shaped field never lands it in
//! the audit table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use jobforge_core::ActorId;
use jobforge_core::AuditAction;
use jobforge_core::AuditLogEntry;
use jobforge_core::AuditLogStore;
use jobforge_core::TenantId;
use jobforge_core::Timestamp;
use jobforge_core::TraceId;
use jobforge_core::error::ApiError;
use jobforge_core::redact::Redactor;
use rusqlite::Connection;
use rusqlite::params;
use serde_json::Value;

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of [`AuditLogStore`].
#[derive(Clone)]
pub struct SqliteAuditLogStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteAuditLogStore {
    /// Wraps a shared connection.
    #[must_use]
    pub const fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    /// Locks the shared connection, converting a poisoned mutex into an
    /// internal error rather than panicking.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ApiError> {
        self.connection
            .lock()
            .map_err(|_| ApiError::internal("audit log store connection mutex poisoned"))
    }
}

/// Returns the stored text label for an [`AuditAction`].
fn action_label(action: AuditAction) -> &'static str {
    match action {
        AuditAction::EventSubmitted => "event_submitted",
        AuditAction::JobRequested => "job_requested",
        AuditAction::JobCancelled => "job_cancelled",
        AuditAction::PolicyDenied => "policy_denied",
        AuditAction::TemplateEnabled => "template_enabled",
        AuditAction::TemplateDisabled => "template_disabled",
        AuditAction::TokenIssued => "token_issued",
        AuditAction::TokenConsumed => "token_consumed",
    }
}

/// Parses a stored `action` label, defaulting unrecognized labels to
/// [`AuditAction::EventSubmitted`].
fn parse_action(label: &str) -> AuditAction {
    match label {
        "job_requested" => AuditAction::JobRequested,
        "job_cancelled" => AuditAction::JobCancelled,
        "policy_denied" => AuditAction::PolicyDenied,
        "template_enabled" => AuditAction::TemplateEnabled,
        "template_disabled" => AuditAction::TemplateDisabled,
        "token_issued" => AuditAction::TokenIssued,
        "token_consumed" => AuditAction::TokenConsumed,
        _ => AuditAction::EventSubmitted,
    }
}

/// Maps an `audit_log` row into an [`AuditLogEntry`].
fn map_audit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditLogEntry> {
    let id: String = row.get("id")?;
    let tenant_id: String = row.get("tenant_id")?;
    let actor_id: Option<String> = row.get("actor_id")?;
    let action: String = row.get("action")?;
    let subject_type: String = row.get("subject_type")?;
    let subject_id: String = row.get("subject_id")?;
    let trace_id: String = row.get("trace_id")?;
    let occurred_at: String = row.get("occurred_at")?;
    let metadata: String = row.get("metadata")?;

    Ok(AuditLogEntry {
        id,
        tenant_id: TenantId::new(tenant_id),
        actor_id: actor_id.map(ActorId::new),
        action: parse_action(&action),
        subject_type,
        subject_id,
        trace_id: TraceId::new(trace_id),
        occurred_at: Timestamp::parse_rfc3339(&occurred_at).unwrap_or_else(|_| Timestamp::now()),
        metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
    })
}

impl AuditLogStore for SqliteAuditLogStore {
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
    ) -> Result<AuditLogEntry, ApiError> {
        let guard = self.lock()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Timestamp::now();
        let redacted_metadata = Redactor::with_defaults().redact(&metadata);
        let metadata_text =
            serde_json::to_string(&redacted_metadata).map_err(|err| ApiError::internal(err.to_string()))?;

        guard
            .execute(
                "INSERT INTO audit_log (
                    id, tenant_id, actor_id, action, subject_type, subject_id,
                    trace_id, occurred_at, metadata
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    tenant_id.as_str(),
                    actor_id,
                    action_label(action),
                    subject_type,
                    subject_id,
                    trace_id.as_str(),
                    now.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?,
                    metadata_text,
                ],
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;

        Ok(AuditLogEntry {
            id,
            tenant_id: tenant_id.clone(),
            actor_id: actor_id.map(ActorId::new),
            action,
            subject_type: subject_type.to_string(),
            subject_id: subject_id.to_string(),
            trace_id: trace_id.clone(),
            occurred_at: now,
            metadata: redacted_metadata,
        })
    }

    fn list(&self, tenant_id: &TenantId, limit: u32) -> Result<Vec<AuditLogEntry>, ApiError> {
        let guard = self.lock()?;
        let limit = if limit == 0 { 100 } else { limit };
        let mut stmt = guard
            .prepare(
                "SELECT * FROM audit_log WHERE tenant_id = ?1 ORDER BY occurred_at DESC LIMIT ?2",
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        let rows = stmt
            .query_map(params![tenant_id.as_str(), limit], map_audit_row)
            .map_err(|err| ApiError::internal(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| ApiError::internal(err.to_string()))
    }
}
