// jobforge-core/src/audit.rs
// ============================================================================
// Module: JobForge Audit Log Model
// Description: The append-only, tenant-scoped admin-visible event record.
// Purpose: Define the audit action vocabulary and log row shape.
// Dependencies: serde, serde_json, crate::{ids, time}
// ============================================================================

//! ## Overview
//! Audit rows are never updated or deleted by ordinary code paths; the
//! store layer only ever inserts. `action` is a closed enum so downstream
//! reporting does not need to pattern-match on free-form strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::ids::ActorId;
use crate::ids::TenantId;
use crate::ids::TraceId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Audit Action
// ============================================================================

/// The closed set of admin-visible operations recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// An event was accepted by the event store.
    EventSubmitted,
    /// A template compile (`RequestJob`) was attempted.
    JobRequested,
    /// A job was cancelled.
    JobCancelled,
    /// A `RequestJob` call was denied by the policy gate.
    PolicyDenied,
    /// A template was enabled.
    TemplateEnabled,
    /// A template was disabled.
    TemplateDisabled,
    /// A policy token was issued.
    TokenIssued,
    /// A policy token was consumed.
    TokenConsumed,
}

// ============================================================================
// SECTION: Audit Log Entry
// ============================================================================

/// A single append-only audit row.
///
/// # Invariants
/// - Never references a tenant other than `tenant_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Row identifier.
    pub id: String,
    /// Owning tenant; the sole tenant this row may ever reference.
    pub tenant_id: TenantId,
    /// The actor that performed the operation, if known.
    pub actor_id: Option<ActorId>,
    /// The action that occurred.
    pub action: AuditAction,
    /// The kind of entity this entry concerns (e.g. `"job"`, `"template"`).
    pub subject_type: String,
    /// The id of the entity this entry concerns.
    pub subject_id: String,
    /// Trace id of the request that caused this entry.
    pub trace_id: TraceId,
    /// When the action occurred.
    pub occurred_at: Timestamp,
    /// Free-form, already-redacted metadata.
    pub metadata: Value,
}
