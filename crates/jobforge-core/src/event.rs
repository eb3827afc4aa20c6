// jobforge-core/src/event.rs
// ============================================================================
// Module: JobForge Event Model
// Description: Append-only event row accepted by the event store.
// Purpose: Define the shape ingested by SubmitEvent and read by ListEvents.
// Dependencies: serde, serde_json, crate::{ids, time}
// ============================================================================

//! ## Overview
//! Events are immutable after insert except for `processed` and
//! `processing_job_id`, which the event store may set opportunistically
//! when ingestion atomically enqueues a follow-up job. Callers must not
//! assume `processing_job_id` is ever set; see the module docs on
//! `jobforge-store-sqlite::events`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::ids::EventId;
use crate::ids::JobId;
use crate::ids::ProjectId;
use crate::ids::TenantId;
use crate::ids::TraceId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum allowed serialized size of an event's `payload`, in bytes.
pub const MAX_EVENT_PAYLOAD_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: Event Row
// ============================================================================

/// An append-only ingestion record.
///
/// # Invariants
/// - Immutable after insert except `processed` and `processing_job_id`.
/// - `trace_id` is required and well-formed.
/// - Serialized `payload` is at most [`MAX_EVENT_PAYLOAD_BYTES`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Optional project scope within the tenant.
    pub project_id: Option<ProjectId>,
    /// Schema version of this event type.
    pub event_version: i32,
    /// Event type, used to select the registered payload schema.
    pub event_type: String,
    /// When the event occurred at the source, as reported by the caller.
    pub occurred_at: Timestamp,
    /// Trace id linking this event to the request that produced it.
    pub trace_id: TraceId,
    /// Application that submitted the event.
    pub source_app: String,
    /// Optional finer-grained module within `source_app`.
    pub source_module: Option<String>,
    /// Optional subject entity type this event concerns.
    pub subject_type: Option<String>,
    /// Optional subject entity id this event concerns.
    pub subject_id: Option<String>,
    /// Opaque structured payload.
    pub payload: Value,
    /// Whether the payload is known to contain personally identifying data.
    pub contains_pii: bool,
    /// Free-form hints guiding retention/redaction policy downstream.
    pub redaction_hints: Vec<String>,
    /// Whether a consumer has marked this event as processed.
    pub processed: bool,
    /// Best-effort link to a job enqueued as a result of this event.
    pub processing_job_id: Option<JobId>,
    /// Row creation time.
    pub created_at: Timestamp,
}

impl Event {
    /// Returns whether `payload`, once serialized, fits within
    /// [`MAX_EVENT_PAYLOAD_BYTES`].
    ///
    /// # Errors
    ///
    /// Returns an error if `payload` cannot be serialized at all.
    pub fn payload_within_size_limit(payload: &Value) -> Result<bool, serde_json::Error> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(bytes.len() <= MAX_EVENT_PAYLOAD_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Event;
    use super::MAX_EVENT_PAYLOAD_BYTES;

    #[test]
    fn small_payload_is_within_limit() {
        let payload = json!({"v": 1});
        assert!(Event::payload_within_size_limit(&payload).expect("serialize"));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = json!({"blob": "x".repeat(MAX_EVENT_PAYLOAD_BYTES + 1)});
        assert!(!Event::payload_within_size_limit(&payload).expect("serialize"));
    }
}
