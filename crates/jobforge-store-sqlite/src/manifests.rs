// jobforge-store-sqlite/src/manifests.rs
// ============================================================================
// Module: SQLite Manifest Store
// Description: The canonical, content-addressed summary of completed runs.
// Purpose: Implement jobforge_core::store::ManifestStore against a single
//          SQLite connection.
// Dependencies: jobforge-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! A manifest is keyed by `run_id`, which equals the job id that produced
//! it. `put_manifest` replaces any existing row for the same run id, since
//! a run's manifest is written incrementally (`pending` -> `complete`/
//! `failed`) rather than appended as a log.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use jobforge_core::JobId;
use jobforge_core::Manifest;
use jobforge_core::ManifestStore;
use jobforge_core::TenantId;
use jobforge_core::Timestamp;
use jobforge_core::error::ApiError;
use jobforge_core::manifest::ManifestOutput;
use jobforge_core::manifest::ManifestStatus;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of [`ManifestStore`].
#[derive(Clone)]
pub struct SqliteManifestStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteManifestStore {
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
            .map_err(|_| ApiError::internal("manifest store connection mutex poisoned"))
    }
}

/// Returns the stored text label for a [`ManifestStatus`].
fn status_label(status: ManifestStatus) -> &'static str {
    match status {
        ManifestStatus::Pending => "pending",
        ManifestStatus::Complete => "complete",
        ManifestStatus::Failed => "failed",
    }
}

/// Parses a stored `status` label, defaulting unrecognized labels to
/// [`ManifestStatus::Pending`].
fn parse_status(label: &str) -> ManifestStatus {
    match label {
        "complete" => ManifestStatus::Complete,
        "failed" => ManifestStatus::Failed,
        _ => ManifestStatus::Pending,
    }
}

/// Maps a `manifests` row into a [`Manifest`].
fn map_manifest_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Manifest> {
    let run_id: String = row.get("run_id")?;
    let tenant_id: String = row.get("tenant_id")?;
    let job_type: String = row.get("job_type")?;
    let outputs: String = row.get("outputs")?;
    let metrics: String = row.get("metrics")?;
    let env_fingerprint: String = row.get("env_fingerprint")?;
    let tool_versions: String = row.get("tool_versions")?;
    let inputs_snapshot_ref: Option<String> = row.get("inputs_snapshot_ref")?;
    let logs_ref: Option<String> = row.get("logs_ref")?;
    let status: String = row.get("status")?;
    let error: Option<String> = row.get("error")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Manifest {
        run_id: JobId::from_uuid(uuid::Uuid::parse_str(&run_id).unwrap_or_default()),
        tenant_id: TenantId::new(tenant_id),
        job_type,
        outputs: serde_json::from_str(&outputs).unwrap_or_default(),
        metrics: serde_json::from_str::<BTreeMap<String, f64>>(&metrics).unwrap_or_default(),
        env_fingerprint,
        tool_versions: serde_json::from_str::<BTreeMap<String, String>>(&tool_versions).unwrap_or_default(),
        inputs_snapshot_ref,
        logs_ref,
        status: parse_status(&status),
        error: error.and_then(|text| serde_json::from_str(&text).ok()),
        created_at: Timestamp::parse_rfc3339(&created_at).unwrap_or_else(|_| Timestamp::now()),
        updated_at: Timestamp::parse_rfc3339(&updated_at).unwrap_or_else(|_| Timestamp::now()),
    })
}

impl ManifestStore for SqliteManifestStore {
    fn put_manifest(&self, manifest: Manifest) -> Result<(), ApiError> {
        let guard = self.lock()?;
        let outputs_text: Vec<ManifestOutput> = manifest.outputs;
        let outputs_text =
            serde_json::to_string(&outputs_text).map_err(|err| ApiError::internal(err.to_string()))?;
        let metrics_text = serde_json::to_string(&manifest.metrics).map_err(|err| ApiError::internal(err.to_string()))?;
        let tool_versions_text =
            serde_json::to_string(&manifest.tool_versions).map_err(|err| ApiError::internal(err.to_string()))?;
        let error_text = manifest
            .error
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| ApiError::internal(err.to_string()))?;

        guard
            .execute(
                "INSERT INTO manifests (
                    run_id, tenant_id, job_type, outputs, metrics, env_fingerprint,
                    tool_versions, inputs_snapshot_ref, logs_ref, status, error,
                    created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT (run_id) DO UPDATE SET
                    job_type = excluded.job_type,
                    outputs = excluded.outputs,
                    metrics = excluded.metrics,
                    env_fingerprint = excluded.env_fingerprint,
                    tool_versions = excluded.tool_versions,
                    inputs_snapshot_ref = excluded.inputs_snapshot_ref,
                    logs_ref = excluded.logs_ref,
                    status = excluded.status,
                    error = excluded.error,
                    updated_at = excluded.updated_at",
                params![
                    manifest.run_id.as_uuid().to_string(),
                    manifest.tenant_id.as_str(),
                    manifest.job_type,
                    outputs_text,
                    metrics_text,
                    manifest.env_fingerprint,
                    tool_versions_text,
                    manifest.inputs_snapshot_ref,
                    manifest.logs_ref,
                    status_label(manifest.status),
                    error_text,
                    manifest.created_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?,
                    manifest.updated_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?,
                ],
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(())
    }

    fn get_manifest(&self, run_id: JobId, tenant_id: &TenantId) -> Result<Manifest, ApiError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT * FROM manifests WHERE run_id = ?1 AND tenant_id = ?2",
                params![run_id.as_uuid().to_string(), tenant_id.as_str()],
                map_manifest_row,
            )
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("manifest not found"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    use jobforge_core::JobId;
    use jobforge_core::Manifest;
    use jobforge_core::ManifestStore;
    use jobforge_core::TenantId;
    use jobforge_core::Timestamp;
    use jobforge_core::manifest::ManifestOutput;
    use jobforge_core::manifest::ManifestStatus;

    use super::SqliteManifestStore;
    use crate::conn::open_in_memory;

    fn store() -> SqliteManifestStore {
        let connection = open_in_memory().expect("open in-memory store");
        SqliteManifestStore::new(Arc::new(Mutex::new(connection)))
    }

    fn sample(run_id: JobId) -> Manifest {
        let now = Timestamp::now();
        Manifest {
            run_id,
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
    fn put_then_get_round_trips() {
        let store = store();
        let run_id = JobId::generate();
        let tenant = TenantId::new("acme");
        store.put_manifest(sample(run_id)).expect("put");
        let fetched = store.get_manifest(run_id, &tenant).expect("get");
        assert_eq!(fetched.outputs.len(), 1);
    }

    #[test]
    fn put_manifest_replaces_existing_row() {
        let store = store();
        let run_id = JobId::generate();
        let tenant = TenantId::new("acme");
        store.put_manifest(sample(run_id)).expect("put pending");
        let mut updated = sample(run_id);
        updated.status = ManifestStatus::Failed;
        store.put_manifest(updated).expect("put failed");
        let fetched = store.get_manifest(run_id, &tenant).expect("get");
        assert_eq!(fetched.status, ManifestStatus::Failed);
    }

    #[test]
    fn get_missing_manifest_is_not_found() {
        let store = store();
        let tenant = TenantId::new("acme");
        assert!(store.get_manifest(JobId::generate(), &tenant).is_err());
    }
}
