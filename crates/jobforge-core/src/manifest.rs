// jobforge-core/src/manifest.rs
// ============================================================================
// Module: JobForge Manifest Model
// Description: The canonical, content-addressed summary of a completed run.
// Purpose: Define the manifest row a consumer can verify byte-for-byte.
// Dependencies: serde, serde_json, crate::{ids, time}
// ============================================================================

//! ## Overview
//! A manifest is keyed by run id, which is identical to the job id that
//! produced it. It records output references rather than output bytes,
//! plus enough environment fingerprinting (tool versions, env fingerprint)
//! for a consumer to reason about reproducibility.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::ids::JobId;
use crate::ids::TenantId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Manifest Status
// ============================================================================

/// Lifecycle state of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    /// The run has not finished; outputs may still be partial.
    Pending,
    /// The run completed successfully; outputs are final.
    Complete,
    /// The run failed; `error` is populated.
    Failed,
}

// ============================================================================
// SECTION: Manifest Output
// ============================================================================

/// A single named output reference recorded on a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestOutput {
    /// Output name, unique within the manifest.
    pub name: String,
    /// Output type discriminator (e.g. `"file"`, `"value"`, `"url"`).
    #[serde(rename = "type")]
    pub output_type: String,
    /// Opaque reference to the stored artifact or inline value.
    #[serde(rename = "ref")]
    pub output_ref: String,
    /// Size in bytes, when known.
    pub size: Option<u64>,
    /// Content checksum, when known.
    pub checksum: Option<String>,
    /// MIME type, when known.
    pub mime_type: Option<String>,
}

// ============================================================================
// SECTION: Manifest Row
// ============================================================================

/// The canonical, content-addressed summary of a completed run.
///
/// # Invariants
/// - `run_id` equals the job id that produced this manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Run identifier, equal to the producing job's id.
    pub run_id: JobId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The job type that produced this run.
    pub job_type: String,
    /// Named output references.
    pub outputs: Vec<ManifestOutput>,
    /// Free-form numeric metrics (duration, retries, bytes processed, ...).
    pub metrics: BTreeMap<String, f64>,
    /// Opaque fingerprint of the execution environment.
    pub env_fingerprint: String,
    /// Versions of tools/connectors invoked during the run.
    pub tool_versions: BTreeMap<String, String>,
    /// Opaque reference to a snapshot of the run's inputs, if retained.
    pub inputs_snapshot_ref: Option<String>,
    /// Opaque reference to captured logs, if retained.
    pub logs_ref: Option<String>,
    /// Lifecycle state.
    pub status: ManifestStatus,
    /// Structured error, present when `status = failed`.
    pub error: Option<ApiError>,
    /// When this manifest was created.
    pub created_at: Timestamp,
    /// When this manifest was last updated.
    pub updated_at: Timestamp,
}

impl Manifest {
    /// Returns this manifest's outputs as an opaque JSON array, suitable
    /// for `ListArtifacts`.
    #[must_use]
    pub fn outputs_as_value(&self) -> Value {
        serde_json::to_value(&self.outputs).unwrap_or(Value::Array(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::Manifest;
    use super::ManifestOutput;
    use super::ManifestStatus;
    use crate::ids::JobId;
    use crate::ids::TenantId;
    use crate::time::Timestamp;

    fn sample_manifest() -> Manifest {
        let now = Timestamp::now();
        Manifest {
            run_id: JobId::generate(),
            tenant_id: TenantId::new("acme"),
            job_type: "echo".to_string(),
            outputs: vec![ManifestOutput {
                name: "result".to_string(),
                output_type: "value".to_string(),
                output_ref: "inline://result".to_string(),
                size: None,
                checksum: None,
                mime_type: None,
            }],
            metrics: BTreeMap::new(),
            env_fingerprint: "fp".to_string(),
            tool_versions: BTreeMap::new(),
            inputs_snapshot_ref: None,
            logs_ref: None,
            status: ManifestStatus::Complete,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn outputs_as_value_serializes_array() {
        let manifest = sample_manifest();
        let value = manifest.outputs_as_value();
        assert!(value.is_array());
        assert_eq!(value.as_array().expect("array").len(), 1);
    }
}
