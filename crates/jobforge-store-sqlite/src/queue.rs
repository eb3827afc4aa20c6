// jobforge-store-sqlite/src/queue.rs
// ============================================================================
// Module: SQLite Job Queue Core
// Description: The persistent FIFO-per-tenant job queue with leases,
//              idempotency, attempts, and scheduling.
// Purpose: Implement jobforge_core::store::JobStore against a single
//          SQLite connection.
// Dependencies: jobforge-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! `SqliteJobStore` serializes every mutating call through one connection
//! guarded by a mutex and a `BEGIN IMMEDIATE` transaction, which gives the
//! same "two concurrent claimers never overlap" guarantee `SELECT ... FOR
//! UPDATE SKIP LOCKED` gives on Postgres: only one transaction can hold the
//! write lock at a time, so a second claimer's transaction simply waits
//! (bounded by the busy timeout) rather than observing rows mid-claim.
//! Claim fairness is round-robin over tenants with eligible work, one job
//! per tenant per round, so a single hot tenant cannot starve others.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use jobforge_core::Job;
use jobforge_core::JobError;
use jobforge_core::JobId;
use jobforge_core::JobOutcome;
use jobforge_core::JobResult;
use jobforge_core::JobStatus;
use jobforge_core::JobStore;
use jobforge_core::TenantId;
use jobforge_core::Timestamp;
use jobforge_core::WorkerId;
use jobforge_core::error::ApiError;
use jobforge_core::job::backoff_delay_ms;
use jobforge_core::job::random_jitter_unit;
use jobforge_core::store::JobListFilters;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde_json::Value;

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of [`JobStore`].
#[derive(Clone)]
pub struct SqliteJobStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Worker lease duration in milliseconds.
    lease_duration_ms: u64,
    /// Backoff base delay in milliseconds.
    backoff_base_ms: u64,
    /// Backoff growth multiplier.
    backoff_multiplier: f64,
    /// Backoff cap in milliseconds.
    backoff_cap_ms: u64,
    /// Maximum jobs claimed per tenant per `ClaimJobs` round.
    claim_fetch_quota: u32,
    /// Default `max_attempts` when a caller does not specify one.
    default_max_attempts: i32,
}

impl SqliteJobStore {
    /// Wraps a shared connection with queue tunables.
    #[must_use]
    pub const fn new(
        connection: Arc<Mutex<Connection>>,
        lease_duration_ms: u64,
        backoff_base_ms: u64,
        backoff_multiplier: f64,
        backoff_cap_ms: u64,
        claim_fetch_quota: u32,
        default_max_attempts: i32,
    ) -> Self {
        Self {
            connection,
            lease_duration_ms,
            backoff_base_ms,
            backoff_multiplier,
            backoff_cap_ms,
            claim_fetch_quota,
            default_max_attempts,
        }
    }

    /// Locks the shared connection, converting a poisoned mutex into an
    /// internal error rather than panicking.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ApiError> {
        self.connection
            .lock()
            .map_err(|_| ApiError::internal("job store connection mutex poisoned"))
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Maps a `jobs` row into a [`Job`].
fn map_job_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let id: String = row.get("id")?;
    let tenant_id: String = row.get("tenant_id")?;
    let job_type: String = row.get("job_type")?;
    let payload: String = row.get("payload")?;
    let idempotency_key: Option<String> = row.get("idempotency_key")?;
    let status: String = row.get("status")?;
    let run_at: String = row.get("run_at")?;
    let attempts: i32 = row.get("attempts")?;
    let max_attempts: i32 = row.get("max_attempts")?;
    let last_error: Option<String> = row.get("last_error")?;
    let claimed_by: Option<String> = row.get("claimed_by")?;
    let lease_expires_at: Option<String> = row.get("lease_expires_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Job {
        id: JobId::from_uuid(uuid::Uuid::parse_str(&id).unwrap_or_default()),
        tenant_id: TenantId::new(tenant_id),
        job_type,
        payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
        idempotency_key,
        status: parse_status(&status),
        run_at: Timestamp::parse_rfc3339(&run_at).unwrap_or_else(|_| Timestamp::now()),
        attempts,
        max_attempts,
        last_error: last_error.and_then(|text| serde_json::from_str(&text).ok()),
        claimed_by: claimed_by.map(WorkerId::new),
        lease_expires_at: lease_expires_at.and_then(|text| Timestamp::parse_rfc3339(&text).ok()),
        created_at: Timestamp::parse_rfc3339(&created_at).unwrap_or_else(|_| Timestamp::now()),
        updated_at: Timestamp::parse_rfc3339(&updated_at).unwrap_or_else(|_| Timestamp::now()),
    })
}

/// Parses a `jobs.status` column value, defaulting unrecognized labels to
/// `Queued` rather than failing the row mapping.
fn parse_status(label: &str) -> JobStatus {
    match label {
        "claimed" => JobStatus::Claimed,
        "running" => JobStatus::Running,
        "succeeded" => JobStatus::Succeeded,
        "failed" => JobStatus::Failed,
        "cancelled" => JobStatus::Cancelled,
        "dead_lettered" => JobStatus::DeadLettered,
        _ => JobStatus::Queued,
    }
}

// ============================================================================
// SECTION: JobStore Implementation
// ============================================================================

impl JobStore for SqliteJobStore {
    fn enqueue(
        &self,
        tenant_id: &TenantId,
        job_type: &str,
        payload: Value,
        idempotency_key: Option<&str>,
        run_at: Option<Timestamp>,
        max_attempts: Option<i32>,
    ) -> Result<Job, ApiError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction()
            .map_err(|err| ApiError::internal(format!("begin transaction: {err}")))?;

        let job_id = JobId::generate();
        let now = Timestamp::now();
        let run_at = run_at.unwrap_or(now);
        let max_attempts = max_attempts.unwrap_or(self.default_max_attempts);
        let payload_text = serde_json::to_string(&payload).map_err(|err| ApiError::validation(err.to_string()))?;

        let inserted = tx.execute(
            "INSERT INTO jobs (
                id, tenant_id, job_type, payload, idempotency_key, status,
                run_at, attempts, max_attempts, last_error, claimed_by,
                lease_expires_at, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, 'queued', ?6, 0, ?7, NULL, NULL, NULL, ?8, ?8)
             ON CONFLICT (tenant_id, job_type, idempotency_key)
             WHERE idempotency_key IS NOT NULL DO NOTHING",
            params![
                job_id.as_uuid().to_string(),
                tenant_id.as_str(),
                job_type,
                payload_text,
                idempotency_key,
                run_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?,
                max_attempts,
                now.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?,
            ],
        );

        let result = match inserted {
            Ok(1) => {
                let job = tx
                    .query_row("SELECT * FROM jobs WHERE id = ?1", params![job_id.as_uuid().to_string()], map_job_row)
                    .map_err(|err| ApiError::internal(err.to_string()))?;
                Ok(job)
            }
            Ok(_) => {
                // Unique violation absorbed by DO NOTHING: return the existing row.
                let existing_key = idempotency_key.ok_or_else(|| ApiError::internal("enqueue insert affected zero rows without an idempotency key"))?;
                let job = tx
                    .query_row(
                        "SELECT * FROM jobs WHERE tenant_id = ?1 AND job_type = ?2 AND idempotency_key = ?3",
                        params![tenant_id.as_str(), job_type, existing_key],
                        map_job_row,
                    )
                    .map_err(|err| ApiError::internal(err.to_string()))?;
                Ok(job)
            }
            Err(err) => Err(ApiError::internal(err.to_string())),
        };

        match &result {
            Ok(_) => tx.commit().map_err(|err| ApiError::internal(err.to_string()))?,
            Err(_) => {
                let _ = tx.rollback();
            }
        }
        result
    }

    fn claim_jobs(&self, worker_id: &WorkerId, limit: u32) -> Result<Vec<Job>, ApiError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction()
            .map_err(|err| ApiError::internal(format!("begin transaction: {err}")))?;
        let now = Timestamp::now();
        let now_text = now.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;
        let lease_expires_at = now.plus_millis(
            i64::try_from(self.lease_duration_ms).map_err(|err| ApiError::internal(err.to_string()))?,
        );
        let lease_text = lease_expires_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;

        let tenant_ids: Vec<String> = {
            let mut stmt = tx
                .prepare(
                    "SELECT DISTINCT tenant_id FROM jobs WHERE status = 'queued' AND run_at <= ?1
                     ORDER BY tenant_id ASC",
                )
                .map_err(|err| ApiError::internal(err.to_string()))?;
            let rows = stmt
                .query_map(params![now_text], |row| row.get::<_, String>(0))
                .map_err(|err| ApiError::internal(err.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|err| ApiError::internal(err.to_string()))?
        };

        let mut claimed = Vec::new();
        let mut per_tenant_claimed: std::collections::HashMap<String, u32> = std::collections::HashMap::new();

        'rounds: loop {
            if claimed.len() as u32 >= limit || tenant_ids.is_empty() {
                break;
            }
            let mut progressed = false;
            for tenant_id in tenant_ids.clone() {
                if claimed.len() as u32 >= limit {
                    break 'rounds;
                }
                let quota_used = per_tenant_claimed.get(&tenant_id).copied().unwrap_or(0);
                if quota_used >= self.claim_fetch_quota {
                    continue;
                }
                let next_id: Option<String> = tx
                    .query_row(
                        "SELECT id FROM jobs WHERE tenant_id = ?1 AND status = 'queued' AND run_at <= ?2
                         ORDER BY run_at ASC, created_at ASC LIMIT 1",
                        params![tenant_id, now_text],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|err| ApiError::internal(err.to_string()))?;
                let Some(job_id) = next_id else {
                    continue;
                };
                tx.execute(
                    "UPDATE jobs SET status = 'claimed', claimed_by = ?1, lease_expires_at = ?2,
                        attempts = attempts + 1, updated_at = ?3
                     WHERE id = ?4",
                    params![worker_id.as_str(), lease_text, now_text, job_id],
                )
                .map_err(|err| ApiError::internal(err.to_string()))?;
                let job = tx
                    .query_row("SELECT * FROM jobs WHERE id = ?1", params![job_id], map_job_row)
                    .map_err(|err| ApiError::internal(err.to_string()))?;
                claimed.push(job);
                *per_tenant_claimed.entry(tenant_id).or_insert(0) += 1;
                progressed = true;
            }
            if !progressed {
                break;
            }
        }

        tx.commit().map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(claimed)
    }

    fn heartbeat(&self, job_id: JobId, worker_id: &WorkerId) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction()
            .map_err(|err| ApiError::internal(format!("begin transaction: {err}")))?;
        let job = tx
            .query_row("SELECT * FROM jobs WHERE id = ?1", params![job_id.as_uuid().to_string()], map_job_row)
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("job not found"))?;

        if job.status.is_terminal() || job.status == JobStatus::Cancelled {
            return Err(ApiError::invalid_state("job is no longer active"));
        }
        if !job.is_owned_by(worker_id) {
            return Err(ApiError::not_owner("worker does not hold this job's lease"));
        }

        let now = Timestamp::now();
        let now_text = now.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;
        let lease_expires_at = now.plus_millis(
            i64::try_from(self.lease_duration_ms).map_err(|err| ApiError::internal(err.to_string()))?,
        );
        let lease_text = lease_expires_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;

        tx.execute(
            "UPDATE jobs SET status = 'running', lease_expires_at = ?1, updated_at = ?2 WHERE id = ?3",
            params![lease_text, now_text, job_id.as_uuid().to_string()],
        )
        .map_err(|err| ApiError::internal(err.to_string()))?;
        tx.commit().map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(())
    }

    fn complete_job(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        outcome: JobOutcome,
        error: Option<JobError>,
        result: Option<Value>,
        artifact_ref: Option<String>,
    ) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction()
            .map_err(|err| ApiError::internal(format!("begin transaction: {err}")))?;
        let job = tx
            .query_row("SELECT * FROM jobs WHERE id = ?1", params![job_id.as_uuid().to_string()], map_job_row)
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("job not found"))?;

        if job.status.is_terminal() {
            return Err(ApiError::invalid_state("job is already terminal"));
        }
        if !job.is_owned_by(worker_id) {
            return Err(ApiError::not_owner("worker does not hold this job's lease"));
        }

        let now = Timestamp::now();
        let now_text = now.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;

        match outcome {
            JobOutcome::Succeeded => {
                tx.execute(
                    "UPDATE jobs SET status = 'succeeded', claimed_by = NULL, lease_expires_at = NULL,
                        updated_at = ?1 WHERE id = ?2",
                    params![now_text, job_id.as_uuid().to_string()],
                )
                .map_err(|err| ApiError::internal(err.to_string()))?;
                insert_job_result(&tx, &job, JobOutcome::Succeeded, &result, &None, &artifact_ref, now)?;
            }
            JobOutcome::Failed => {
                let retryable = error.as_ref().is_some_and(|err| err.retryable);
                if job.attempts < job.max_attempts && retryable {
                    let delay_ms = backoff_delay_ms(
                        job.attempts,
                        self.backoff_base_ms,
                        self.backoff_multiplier,
                        self.backoff_cap_ms,
                        random_jitter_unit(),
                    );
                    let run_at = now.plus_millis(i64::try_from(delay_ms).map_err(|err| ApiError::internal(err.to_string()))?);
                    let run_at_text = run_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;
                    let error_text = error
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()
                        .map_err(|err| ApiError::internal(err.to_string()))?;
                    tx.execute(
                        "UPDATE jobs SET status = 'queued', claimed_by = NULL, lease_expires_at = NULL,
                            run_at = ?1, last_error = ?2, updated_at = ?3 WHERE id = ?4",
                        params![run_at_text, error_text, now_text, job_id.as_uuid().to_string()],
                    )
                    .map_err(|err| ApiError::internal(err.to_string()))?;
                } else {
                    let error_text = error
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()
                        .map_err(|err| ApiError::internal(err.to_string()))?;
                    tx.execute(
                        "UPDATE jobs SET status = 'dead_lettered', claimed_by = NULL, lease_expires_at = NULL,
                            last_error = ?1, updated_at = ?2 WHERE id = ?3",
                        params![error_text, now_text, job_id.as_uuid().to_string()],
                    )
                    .map_err(|err| ApiError::internal(err.to_string()))?;
                    insert_job_result(&tx, &job, JobOutcome::Failed, &None, &error, &artifact_ref, now)?;
                }
            }
        }

        tx.commit().map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(())
    }

    fn cancel_job(&self, job_id: JobId, tenant_id: &TenantId) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction()
            .map_err(|err| ApiError::internal(format!("begin transaction: {err}")))?;
        let job = tx
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1 AND tenant_id = ?2",
                params![job_id.as_uuid().to_string(), tenant_id.as_str()],
                map_job_row,
            )
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("job not found"))?;

        if job.status.is_terminal() {
            return Err(ApiError::invalid_state("job is already terminal"));
        }

        let now_text = Timestamp::now().to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;
        tx.execute(
            "UPDATE jobs SET status = 'cancelled', claimed_by = NULL, lease_expires_at = NULL,
                updated_at = ?1 WHERE id = ?2",
            params![now_text, job_id.as_uuid().to_string()],
        )
        .map_err(|err| ApiError::internal(err.to_string()))?;
        tx.commit().map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(())
    }

    fn reschedule_job(&self, job_id: JobId, tenant_id: &TenantId, run_at: Timestamp) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction()
            .map_err(|err| ApiError::internal(format!("begin transaction: {err}")))?;
        let job = tx
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1 AND tenant_id = ?2",
                params![job_id.as_uuid().to_string(), tenant_id.as_str()],
                map_job_row,
            )
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("job not found"))?;

        if job.status != JobStatus::Queued {
            return Err(ApiError::invalid_state("only queued jobs may be rescheduled"));
        }

        let now_text = Timestamp::now().to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;
        let run_at_text = run_at.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;
        tx.execute(
            "UPDATE jobs SET run_at = ?1, updated_at = ?2 WHERE id = ?3",
            params![run_at_text, now_text, job_id.as_uuid().to_string()],
        )
        .map_err(|err| ApiError::internal(err.to_string()))?;
        tx.commit().map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(())
    }

    fn reap_expired_leases(&self, now: Timestamp) -> Result<u64, ApiError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction()
            .map_err(|err| ApiError::internal(format!("begin transaction: {err}")))?;
        let now_text = now.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?;
        let affected = tx
            .execute(
                "UPDATE jobs SET status = 'queued', claimed_by = NULL, lease_expires_at = NULL, updated_at = ?1
                 WHERE status IN ('claimed', 'running') AND lease_expires_at < ?1",
                params![now_text],
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        tx.commit().map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(u64::try_from(affected).unwrap_or(0))
    }

    fn list_jobs(&self, tenant_id: &TenantId, filters: &JobListFilters) -> Result<Vec<Job>, ApiError> {
        let guard = self.lock()?;
        let limit = if filters.limit == 0 { 100 } else { filters.limit };
        let mut stmt = guard
            .prepare(
                "SELECT * FROM jobs WHERE tenant_id = ?1
                 AND (?2 IS NULL OR status = ?2)
                 AND (?3 IS NULL OR job_type = ?3)
                 ORDER BY created_at DESC LIMIT ?4 OFFSET ?5",
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        let rows = stmt
            .query_map(
                params![tenant_id.as_str(), filters.status, filters.job_type, limit, filters.offset],
                map_job_row,
            )
            .map_err(|err| ApiError::internal(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| ApiError::internal(err.to_string()))
    }

    fn get_job(&self, job_id: JobId, tenant_id: &TenantId) -> Result<Job, ApiError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1 AND tenant_id = ?2",
                params![job_id.as_uuid().to_string(), tenant_id.as_str()],
                map_job_row,
            )
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("job not found"))
    }

    fn get_result(&self, job_id: JobId, tenant_id: &TenantId) -> Result<JobResult, ApiError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT job_id, tenant_id, status, result, error, artifact_ref, created_at
                 FROM job_results WHERE job_id = ?1 AND tenant_id = ?2",
                params![job_id.as_uuid().to_string(), tenant_id.as_str()],
                |row| {
                    let job_id: String = row.get(0)?;
                    let tenant_id: String = row.get(1)?;
                    let status: String = row.get(2)?;
                    let result: Option<String> = row.get(3)?;
                    let error: Option<String> = row.get(4)?;
                    let artifact_ref: Option<String> = row.get(5)?;
                    let created_at: String = row.get(6)?;
                    Ok(JobResult {
                        job_id: JobId::from_uuid(uuid::Uuid::parse_str(&job_id).unwrap_or_default()),
                        tenant_id: TenantId::new(tenant_id),
                        status: if status == "succeeded" { JobOutcome::Succeeded } else { JobOutcome::Failed },
                        result: result.and_then(|text| serde_json::from_str(&text).ok()),
                        error: error.and_then(|text| serde_json::from_str(&text).ok()),
                        artifact_ref,
                        created_at: Timestamp::parse_rfc3339(&created_at).unwrap_or_else(|_| Timestamp::now()),
                    })
                },
            )
            .optional()
            .map_err(|err| ApiError::internal(err.to_string()))?
            .ok_or_else(|| ApiError::not_found("job result not found"))
    }
}

/// Inserts the terminal [`JobResult`] row for a job's final attempt.
fn insert_job_result(
    tx: &rusqlite::Transaction<'_>,
    job: &Job,
    outcome: JobOutcome,
    result: &Option<Value>,
    error: &Option<JobError>,
    artifact_ref: &Option<String>,
    now: Timestamp,
) -> Result<(), ApiError> {
    let status_text = match outcome {
        JobOutcome::Succeeded => "succeeded",
        JobOutcome::Failed => "failed",
    };
    let result_text = result.as_ref().map(serde_json::to_string).transpose().map_err(|err| ApiError::internal(err.to_string()))?;
    let error_text = error.as_ref().map(serde_json::to_string).transpose().map_err(|err| ApiError::internal(err.to_string()))?;
    tx.execute(
        "INSERT INTO job_results (job_id, tenant_id, status, result, error, artifact_ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            job.id.as_uuid().to_string(),
            job.tenant_id.as_str(),
            status_text,
            result_text,
            error_text,
            artifact_ref,
            now.to_rfc3339().map_err(|err| ApiError::internal(err.to_string()))?,
        ],
    )
    .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use jobforge_core::JobOutcome;
    use jobforge_core::JobStatus;
    use jobforge_core::JobStore;
    use jobforge_core::TenantId;
    use jobforge_core::WorkerId;
    use serde_json::json;

    use super::SqliteJobStore;
    use crate::conn::open_in_memory;

    fn store() -> SqliteJobStore {
        let connection = open_in_memory().expect("open in-memory store");
        SqliteJobStore::new(Arc::new(Mutex::new(connection)), 60_000, 1_000, 2.0, 300_000, 10, 5)
    }

    #[test]
    fn enqueue_with_idempotency_key_is_absorbed_on_retry() {
        let store = store();
        let tenant = TenantId::new("acme");
        let first = store
            .enqueue(&tenant, "echo", json!({"v": 1}), Some("K"), None, None)
            .expect("enqueue");
        let second = store
            .enqueue(&tenant, "echo", json!({"v": 1}), Some("K"), None, None)
            .expect("enqueue");
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn claim_marks_job_claimed_and_increments_attempts() {
        let store = store();
        let tenant = TenantId::new("acme");
        store.enqueue(&tenant, "echo", json!({}), None, None, None).expect("enqueue");
        let worker = WorkerId::new("w1");
        let claimed = store.claim_jobs(&worker, 10).expect("claim");
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].status, JobStatus::Claimed);
        assert_eq!(claimed[0].attempts, 1);
    }

    #[test]
    fn second_claim_sees_no_overlapping_jobs() {
        let store = store();
        let tenant = TenantId::new("acme");
        store.enqueue(&tenant, "echo", json!({}), None, None, None).expect("enqueue");
        let w1 = WorkerId::new("w1");
        let w2 = WorkerId::new("w2");
        let first = store.claim_jobs(&w1, 10).expect("claim1");
        let second = store.claim_jobs(&w2, 10).expect("claim2");
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 0);
    }

    #[test]
    fn heartbeat_from_wrong_worker_is_not_owner() {
        let store = store();
        let tenant = TenantId::new("acme");
        let job = store.enqueue(&tenant, "echo", json!({}), None, None, None).expect("enqueue");
        let w1 = WorkerId::new("w1");
        store.claim_jobs(&w1, 10).expect("claim");
        let result = store.heartbeat(job.id, &WorkerId::new("w2"));
        assert!(result.is_err());
    }

    #[test]
    fn complete_succeeded_persists_result_and_releases_lease() {
        let store = store();
        let tenant = TenantId::new("acme");
        let job = store.enqueue(&tenant, "echo", json!({}), None, None, None).expect("enqueue");
        let worker = WorkerId::new("w1");
        store.claim_jobs(&worker, 10).expect("claim");
        store
            .complete_job(job.id, &worker, JobOutcome::Succeeded, None, Some(json!({"ok": true})), None)
            .expect("complete");
        let updated = store.get_job(job.id, &tenant).expect("get job");
        assert_eq!(updated.status, JobStatus::Succeeded);
        let result = store.get_result(job.id, &tenant).expect("get result");
        assert_eq!(result.status, JobOutcome::Succeeded);
    }

    #[test]
    fn failed_retryable_job_returns_to_queued() {
        let store = store();
        let tenant = TenantId::new("acme");
        let job = store.enqueue(&tenant, "echo", json!({}), None, None, None).expect("enqueue");
        let worker = WorkerId::new("w1");
        store.claim_jobs(&worker, 10).expect("claim");
        let error = jobforge_core::JobError {
            code: "timeout".to_string(),
            message: "boom".to_string(),
            retryable: true,
        };
        store.complete_job(job.id, &worker, JobOutcome::Failed, Some(error), None, None).expect("complete");
        let updated = store.get_job(job.id, &tenant).expect("get job");
        assert_eq!(updated.status, JobStatus::Queued);
        assert_eq!(updated.attempts, 1);
    }

    #[test]
    fn failed_job_exhausting_attempts_dead_letters() {
        let store = store();
        let tenant = TenantId::new("acme");
        let job = store.enqueue(&tenant, "echo", json!({}), None, None, Some(1)).expect("enqueue");
        let worker = WorkerId::new("w1");
        store.claim_jobs(&worker, 10).expect("claim");
        let error = jobforge_core::JobError {
            code: "timeout".to_string(),
            message: "boom".to_string(),
            retryable: true,
        };
        store.complete_job(job.id, &worker, JobOutcome::Failed, Some(error), None, None).expect("complete");
        let updated = store.get_job(job.id, &tenant).expect("get job");
        assert_eq!(updated.status, JobStatus::DeadLettered);
    }

    #[test]
    fn complete_job_from_non_owner_is_rejected() {
        let store = store();
        let tenant = TenantId::new("acme");
        let job = store.enqueue(&tenant, "echo", json!({}), None, None, None).expect("enqueue");
        store.claim_jobs(&WorkerId::new("w1"), 10).expect("claim");
        let result = store.complete_job(job.id, &WorkerId::new("w2"), JobOutcome::Succeeded, None, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn reap_expired_leases_is_idempotent_when_idle() {
        let store = store();
        let first = store.reap_expired_leases(jobforge_core::Timestamp::now()).expect("reap");
        let second = store.reap_expired_leases(jobforge_core::Timestamp::now()).expect("reap");
        assert_eq!(first, 0);
        assert_eq!(second, 0);
    }

    #[test]
    fn cancel_job_from_queued_succeeds() {
        let store = store();
        let tenant = TenantId::new("acme");
        let job = store.enqueue(&tenant, "echo", json!({}), None, None, None).expect("enqueue");
        store.cancel_job(job.id, &tenant).expect("cancel");
        let updated = store.get_job(job.id, &tenant).expect("get job");
        assert_eq!(updated.status, JobStatus::Cancelled);
    }

    #[test]
    fn claim_fairness_interleaves_tenants() {
        let store = store();
        let tenant_a = TenantId::new("a");
        let tenant_b = TenantId::new("b");
        for _ in 0..5 {
            store.enqueue(&tenant_a, "echo", json!({}), None, None, None).expect("enqueue a");
        }
        store.enqueue(&tenant_b, "echo", json!({}), None, None, None).expect("enqueue b");
        let claimed = store.claim_jobs(&WorkerId::new("w1"), 2).expect("claim");
        let tenants: Vec<_> = claimed.iter().map(|job| job.tenant_id.as_str().to_string()).collect();
        assert!(tenants.contains(&"b".to_string()));
    }
}
