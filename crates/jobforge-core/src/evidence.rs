// jobforge-core/src/evidence.rs
// ============================================================================
// Module: JobForge Evidence Packet
// Description: The deterministic per-invocation record of a connector call.
// Purpose: Define the data shape the Evidence Builder assembles; the
//          builder itself lives in jobforge-connectors alongside the
//          harness that drives it.
// Dependencies: serde, serde_json, crate::{ids, time}
// ============================================================================

//! ## Overview
//! An [`EvidencePacket`] is usable as proof of execution: given identical
//! inputs and outputs, `evidence_hash` is stable. `evidence_hash` is
//! computed over the packet with its own field held out (a packet cannot
//! hash itself), which is why this type's `evidence_hash` field is
//! populated only after construction completes; see
//! `jobforge-connectors::evidence::EvidenceBuilder`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::ids::ConnectorId;
use crate::ids::ProjectId;
use crate::ids::TenantId;
use crate::ids::TraceId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Evidence Packet
// ============================================================================

/// A deterministic, content-addressed record of one connector invocation.
///
/// # Invariants
/// - `evidence_hash` is the hash of this packet with `evidence_hash` itself
///   held out of the hashed representation.
/// - `redacted_input` has already passed through the redactor; it is never
///   the raw caller input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePacket {
    /// Unique identifier for this packet.
    pub evidence_id: String,
    /// Connector that was invoked.
    pub connector_id: ConnectorId,
    /// Trace id of the request that triggered this invocation.
    pub trace_id: TraceId,
    /// When the invocation began.
    pub started_at: Timestamp,
    /// When the invocation ended.
    pub ended_at: Timestamp,
    /// Wall-clock duration of the invocation, in milliseconds.
    pub duration_ms: u64,
    /// Number of retry attempts made beyond the first.
    pub retries: u32,
    /// Status codes observed across all attempts, in order.
    pub status_codes: Vec<i32>,
    /// Redacted view of the connector's input.
    pub redacted_input: Value,
    /// SHA-256 hex digest of the canonicalized output, when successful.
    pub output_hash: Option<String>,
    /// SHA-256 hex digest of this packet with `evidence_hash` held out.
    pub evidence_hash: String,
    /// Whether the invocation ultimately succeeded.
    pub ok: bool,
    /// Structured error, present when `ok = false`.
    pub error: Option<ApiError>,
    /// Backoff delays applied between retries, in milliseconds, in order.
    pub backoff_delays_ms: Vec<u64>,
    /// Whether any attempt was rate-limited.
    pub rate_limited: bool,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Optional project scope within the tenant.
    pub project_id: Option<ProjectId>,
}

/// A view of [`EvidencePacket`] used as the input to its content hash.
///
/// Deliberately excludes `evidence_id`, `started_at`, `ended_at`, and
/// `duration_ms` in addition to `evidence_hash` itself: those fields vary
/// between otherwise-identical invocations (a fresh id, wall-clock time,
/// and elapsed duration each run), and spec scenario S5 requires
/// `evidence_hash` to be identical across repeated runs of the same
/// connector with the same input.
#[derive(Debug, Clone, Serialize)]
pub struct EvidencePacketForHashing<'a> {
    /// See [`EvidencePacket::connector_id`].
    pub connector_id: &'a ConnectorId,
    /// See [`EvidencePacket::trace_id`].
    pub trace_id: &'a TraceId,
    /// See [`EvidencePacket::retries`].
    pub retries: u32,
    /// See [`EvidencePacket::status_codes`].
    pub status_codes: &'a [i32],
    /// See [`EvidencePacket::redacted_input`].
    pub redacted_input: &'a Value,
    /// See [`EvidencePacket::output_hash`].
    pub output_hash: &'a Option<String>,
    /// See [`EvidencePacket::ok`].
    pub ok: bool,
    /// See [`EvidencePacket::error`].
    pub error: &'a Option<ApiError>,
    /// See [`EvidencePacket::backoff_delays_ms`].
    pub backoff_delays_ms: &'a [u64],
    /// See [`EvidencePacket::rate_limited`].
    pub rate_limited: bool,
    /// See [`EvidencePacket::tenant_id`].
    pub tenant_id: &'a TenantId,
    /// See [`EvidencePacket::project_id`].
    pub project_id: &'a Option<ProjectId>,
}

impl EvidencePacket {
    /// Builds a minimal failure packet for the case where the packet
    /// itself could not be hashed (e.g. the canonicalizer rejected the
    /// redacted input). Used only as a last-resort fallback so a connector
    /// invocation always returns a packet, never a raw error.
    #[must_use]
    pub fn unrecoverable(connector_id: ConnectorId, trace_id: TraceId, tenant_id: TenantId, detail: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            evidence_id: String::new(),
            connector_id,
            trace_id,
            started_at: now,
            ended_at: now,
            duration_ms: 0,
            retries: 0,
            status_codes: Vec::new(),
            redacted_input: Value::Null,
            output_hash: None,
            evidence_hash: String::new(),
            ok: false,
            error: Some(ApiError::internal(detail.into())),
            backoff_delays_ms: Vec::new(),
            rate_limited: false,
            tenant_id,
            project_id: None,
        }
    }

    /// Returns the hashable view of this packet, excluding `evidence_hash`.
    #[must_use]
    pub fn for_hashing(&self) -> EvidencePacketForHashing<'_> {
        EvidencePacketForHashing {
            connector_id: &self.connector_id,
            trace_id: &self.trace_id,
            retries: self.retries,
            status_codes: &self.status_codes,
            redacted_input: &self.redacted_input,
            output_hash: &self.output_hash,
            ok: self.ok,
            error: &self.error,
            backoff_delays_ms: &self.backoff_delays_ms,
            rate_limited: self.rate_limited,
            tenant_id: &self.tenant_id,
            project_id: &self.project_id,
        }
    }
}
