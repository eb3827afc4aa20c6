// jobforge-store-sqlite/src/events.rs
// ============================================================================
// Module: SQLite Event Store
// Description: The append-only event ingestion log.
// Purpose: Implement jobforge_core::store::EventStore against a single
//          SQLite connection.
// Dependencies: jobforge-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Events are validated for payload size at the boundary (schema shape
//! validation lives in `jobforge-schema`, invoked by the server before this
//! store is ever called) and inserted as an immutable row. `processed` and
//! `processing_job_id` start `false`/`None`; nothing in this module mutates
//! them after insert - a consumer that enqueues a follow-up job updates them
//! through a future dedicated call, not implemented by this trait today.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use jobforge_core::Event;
use jobforge_core::EventId;
use jobforge_core::EventStore;
use jobforge_core::JobId;
use jobforge_core::TenantId;
use jobforge_core::Timestamp;
use jobforge_core::TraceId;
use jobforge_core::error::ApiError;
use jobforge_core::event::MAX_EVENT_PAYLOAD_BYTES;
use jobforge_core::store::EventListFilters;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde_json::Value;

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of [`EventStore`].
#[derive(Clone)]
pub struct SqliteEventStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteEventStore {
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
            .map_err(|_| ApiError::internal("event store connection mutex poisoned"))
    }
}

/// Maps an `events` row into an [`Event`].
fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let id: String = row.get("id")?;
    let tenant_id: String = row.get("tenant_id")?;
    let project_id: Option<String> = row.get("project_id")?;
    let event_version: i32 = row.get("event_version")?;
    let event_type: String = row.get("event_type")?;
    let occurred_at: String = row.get("occurred_at")?;
    let trace_id: String = row.get("trace_id")?;
    let source_app: String = row.get("source_app")?;
    let source_module: Option<String> = row.get("source_module")?;
    let subject_type: Option<String> = row.get("subject_type")?;
    let subject_id: Option<String> = row.get("subject_id")?;
    let payload: String = row.get("payload")?;
    let contains_pii: bool = row.get("contains_pii")?;
    let redaction_hints: String = row.get("redaction_hints")?;
    let processed: bool = row.get("processed")?;
    let processing_job_id: Option<String> = row.get("processing_job_id")?;
    let created_at: String = row.get("created_at")?;

    Ok(Event {
        id: EventId::from_uuid(uuid::Uuid::parse_str(&id).unwrap_or_default()),
        tenant_id: TenantId::new(tenant_id),
        project_id: project_id.map(Into::into),
        event_version,
        event_type,
        occurred_at: Timestamp::parse_rfc3339(&occurred_at).unwrap_or_else(|_| Timestamp::now()),
        trace_id: TraceId::new(trace_id),
        source_app,
        source_module,
        subject_type,
        subject_id,
        payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
        contains_pii,
        redaction_hints: serde_json::from_str(&redaction_hints).unwrap_or_default(),
        processed,
        processing_job_id: processing_job_id
            .map(|text| JobId::from_uuid(uuid::Uuid::parse_str(&text).unwrap_or_default())),
        created_at: Timestamp::parse_rfc3339(&created_at).unwrap_or_else(|_| Timestamp::now()),
    })
}

impl EventStore for SqliteEventStore {
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
    ) -> Result<Event, ApiError> {
        if !Event::payload_within_size_limit(&payload).map_err(|err| ApiError::validation(err.to_string()))? {
            return Err(ApiError::validation(format!(
                "event payload exceeds {MAX_EVENT_PAYLOAD_BYTES} bytes"
            )));
        }

        let guard = self.lock()?;
        let event_id = EventId::generate();
        let now = Timestamp::now();
        let payload_text = serde_json::to_string(&payload).map_err(|err| ApiError::validation(err.to_string()))?;
        let hints_text =
            serde_json::to_string(&redaction_hints).map_err(|err| ApiError::internal(err.to_string()))?;

        guard
            .execute(
                "INSERT INTO events (
                    id, tenant_id, project_id, event_version, event_type, occurred_at,
                    trace_id, source_app, source_module, subject_type, subject_id,
                    payload, contains_pii, redaction_hints, processed, processing_job_id,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0, NULL, ?15)",
                params![
                    event_id.as_uuid().to_string(),
                    tenant_id.as_str(),
                    project_id,
                    event_version,
                    event_type,
                    occurred_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?,
                    trace_id.as_str(),
                    source_app,
                    source_module,
                    subject_type,
                    subject_id,
                    payload_text,
                    contains_pii,
                    hints_text,
                    now.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?,
                ],
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;

        guard
            .query_row(
                "SELECT * FROM events WHERE id = ?1",
                params![event_id.as_uuid().to_string()],
                map_event_row,
            )
            .map_err(|err| ApiError::internal(err.to_string()))
    }

    fn list_events(&self, tenant_id: &TenantId, filters: &EventListFilters) -> Result<Vec<Event>, ApiError> {
        let guard = self.lock()?;
        let limit = if filters.limit == 0 { 100 } else { filters.limit };
        let since_text = filters
            .since
            .map(Timestamp::to_rfc3339)
            .transpose()
            .map_err(|err| ApiError::internal(err.to_string()))?;
        let until_text = filters
            .until
            .map(Timestamp::to_rfc3339)
            .transpose()
            .map_err(|err| ApiError::internal(err.to_string()))?;
        let processed_flag = filters.processed.map(i64::from);

        let mut stmt = guard
            .prepare(
                "SELECT * FROM events WHERE tenant_id = ?1
                 AND (?2 IS NULL OR event_type = ?2)
                 AND (?3 IS NULL OR source_app = ?3)
                 AND (?4 IS NULL OR processed = ?4)
                 AND (?5 IS NULL OR occurred_at >= ?5)
                 AND (?6 IS NULL OR occurred_at < ?6)
                 ORDER BY occurred_at DESC LIMIT ?7",
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        let rows = stmt
            .query_map(
                params![
                    tenant_id.as_str(),
                    filters.event_type,
                    filters.source_app,
                    processed_flag,
                    since_text,
                    until_text,
                    limit,
                ],
                map_event_row,
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| ApiError::internal(err.to_string()))
    }

    fn get_event(&self, event_id: EventId, tenant_id: &TenantId) -> Result<Event, ApiError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT * FROM events WHERE id = ?1 AND tenant_id = ?2",
                params![event_id.as_uuid().to_string(), tenant_id.as_str()],
                map_event_row,
            )
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("event not found"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use jobforge_core::EventStore;
    use jobforge_core::TenantId;
    use jobforge_core::Timestamp;
    use jobforge_core::TraceId;
    use jobforge_core::store::EventListFilters;
    use serde_json::json;

    use super::SqliteEventStore;
    use crate::conn::open_in_memory;

    fn store() -> SqliteEventStore {
        let connection = open_in_memory().expect("open in-memory store");
        SqliteEventStore::new(Arc::new(Mutex::new(connection)))
    }

    #[test]
    fn submit_and_get_round_trips() {
        let store = store();
        let tenant = TenantId::new("acme");
        let trace = TraceId::new("t1");
        let event = store
            .submit_event(
                &tenant,
                None,
                1,
                "user.signed_up",
                Timestamp::now(),
                &trace,
                "web",
                None,
                None,
                None,
                json!({"user_id": "u1"}),
                false,
                vec![],
            )
            .expect("submit");
        let fetched = store.get_event(event.id, &tenant).expect("get");
        assert_eq!(fetched.event_type, "user.signed_up");
        assert!(!fetched.processed);
    }

    #[test]
    fn oversized_payload_is_rejected_before_insert() {
        let store = store();
        let tenant = TenantId::new("acme");
        let trace = TraceId::new("t1");
        let huge = "x".repeat(300 * 1024);
        let result = store.submit_event(
            &tenant,
            None,
            1,
            "blob.uploaded",
            Timestamp::now(),
            &trace,
            "web",
            None,
            None,
            None,
            json!({"blob": huge}),
            false,
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn list_events_filters_by_type() {
        let store = store();
        let tenant = TenantId::new("acme");
        let trace = TraceId::new("t1");
        store
            .submit_event(&tenant, None, 1, "a", Timestamp::now(), &trace, "web", None, None, None, json!({}), false, vec![])
            .expect("submit a");
        store
            .submit_event(&tenant, None, 1, "b", Timestamp::now(), &trace, "web", None, None, None, json!({}), false, vec![])
            .expect("submit b");
        let filters = EventListFilters { event_type: Some("a".to_string()), ..Default::default() };
        let events = store.list_events(&tenant, &filters).expect("list");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "a");
    }
}
