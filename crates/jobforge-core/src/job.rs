// jobforge-core/src/job.rs
// ============================================================================
// Module: JobForge Job Model
// Description: The job queue's state machine and row types.
// Purpose: Define the Job/JobResult/JobAttempt data model and the backoff
//          function shared by the queue core and the connector harness.
// Dependencies: rand, serde, serde_json, crate::{error, ids, time}
// ============================================================================

//! ## Overview
//! A [`Job`] moves through a small state machine enforced by the store
//! layer, not by this type - `jobforge-core` defines the shape and the
//! transition table's vocabulary, while `jobforge-store-sqlite` enforces
//! transitions transactionally. [`backoff_delay_ms`] is the one piece of
//! executable policy shared verbatim between the queue's retry scheduling
//! and the connector harness's attempt loop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::ids::JobId;
use crate::ids::TenantId;
use crate::ids::WorkerId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum attempts for a job when the caller does not specify one.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Default worker lease duration in milliseconds.
pub const DEFAULT_LEASE_DURATION_MS: i64 = 60_000;

/// Default backoff base delay in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Default backoff multiplier.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default backoff cap in milliseconds.
pub const DEFAULT_BACKOFF_CAP_MS: u64 = 300_000;

/// Jitter fraction applied symmetrically around the computed delay.
pub const BACKOFF_JITTER_FRACTION: f64 = 0.20;

// ============================================================================
// SECTION: Job Status
// ============================================================================

/// A job's position in the queue state machine.
///
/// # Invariants
/// - `Succeeded`, `Cancelled`, and `DeadLettered` are terminal: once
///   reached, no further transition is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Eligible for claim once `run_at` has passed.
    Queued,
    /// Claimed by a worker; no heartbeat received yet.
    Claimed,
    /// Claimed and at least one heartbeat has been observed.
    Running,
    /// Completed successfully. Terminal.
    Succeeded,
    /// Failed after exhausting retries. Terminal.
    Failed,
    /// Cancelled by a tenant-scoped caller. Terminal.
    Cancelled,
    /// Exhausted retries and will not be retried. Terminal.
    DeadLettered,
}

impl JobStatus {
    /// Returns whether this status is terminal (no further transitions).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Cancelled | Self::DeadLettered)
    }

    /// Returns whether `self -> next` is a legal state transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Claimed | Self::Cancelled)
                | (
                    Self::Claimed,
                    Self::Running | Self::Queued | Self::Cancelled
                )
                | (
                    Self::Running,
                    Self::Succeeded | Self::Failed | Self::Queued | Self::Cancelled
                )
                | (Self::Failed, Self::Queued | Self::DeadLettered)
        )
    }
}

// ============================================================================
// SECTION: Job Row
// ============================================================================

/// Structured error attached to a job's `last_error`, as reported by a
/// worker on `CompleteJob`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    /// Worker-assigned error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether the worker believes this failure is retryable.
    pub retryable: bool,
}

impl From<ApiError> for JobError {
    fn from(error: ApiError) -> Self {
        Self {
            code: format!("{:?}", error.kind).to_lowercase(),
            message: error.message,
            retryable: error.retryable,
        }
    }
}

/// A single row in the job queue.
///
/// # Invariants
/// - `attempts <= max_attempts`.
/// - `claimed_by` and `lease_expires_at` are both `Some` iff `status` is
///   `Claimed` or `Running`.
/// - `(tenant_id, type, idempotency_key)` is unique when `idempotency_key`
///   is set - enforced by the store, not this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier, also used as the manifest's run id.
    pub id: JobId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Job type, used to select the registered payload schema.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Opaque structured payload.
    pub payload: Value,
    /// Optional idempotency key, unique per `(tenant_id, type)`.
    pub idempotency_key: Option<String>,
    /// Current state machine position.
    pub status: JobStatus,
    /// Earliest eligibility timestamp.
    pub run_at: Timestamp,
    /// Number of claims made on this job so far.
    pub attempts: i32,
    /// Maximum attempts before dead-lettering.
    pub max_attempts: i32,
    /// Structured error from the most recent failed attempt.
    pub last_error: Option<JobError>,
    /// Worker holding the current claim, if any.
    pub claimed_by: Option<WorkerId>,
    /// Lease expiry for the current claim, if any.
    pub lease_expires_at: Option<Timestamp>,
    /// Row creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
}

impl Job {
    /// Returns whether `worker_id` currently holds this job's claim.
    #[must_use]
    pub fn is_owned_by(&self, worker_id: &WorkerId) -> bool {
        self.claimed_by.as_ref() == Some(worker_id)
    }
}

// ============================================================================
// SECTION: Job Result & Attempt
// ============================================================================

/// Outcome recorded once a job reaches a terminal completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// The job completed successfully.
    Succeeded,
    /// The job failed and will not be retried further.
    Failed,
}

/// One row per terminal completion of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// The job this result belongs to.
    pub job_id: JobId,
    /// Owning tenant, duplicated for index-friendly tenant-scoped reads.
    pub tenant_id: TenantId,
    /// Terminal outcome.
    pub status: JobOutcome,
    /// Structured result payload, present on success.
    pub result: Option<Value>,
    /// Structured error, present on failure.
    pub error: Option<JobError>,
    /// Opaque reference to a persisted artifact bundle, if any.
    pub artifact_ref: Option<String>,
    /// Row creation time.
    pub created_at: Timestamp,
}

/// One row per claim that began running, recording its wall-clock span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAttempt {
    /// The job this attempt belongs to.
    pub job_id: JobId,
    /// 1-based attempt number, matching `Job::attempts` at claim time.
    pub attempt_no: i32,
    /// Worker that held this attempt's claim.
    pub worker_id: WorkerId,
    /// When the claim began.
    pub started_at: Timestamp,
    /// When the attempt ended, if it has.
    pub ended_at: Option<Timestamp>,
    /// Terminal outcome of this attempt, if it has one.
    pub outcome: Option<JobOutcome>,
}

// ============================================================================
// SECTION: Backoff
// ============================================================================

/// Computes a retry delay in milliseconds: `min(cap, base * multiplier^(attempts-1))`
/// with +/-20% jitter applied via the supplied `jitter_unit` in `[0.0, 1.0)`.
///
/// `attempts` is 1-based (the attempt number that just failed). Callers
/// needing deterministic output for tests should pass a fixed `jitter_unit`;
/// production callers should pass a fresh uniform random sample.
#[must_use]
pub fn backoff_delay_ms(attempts: i32, base_ms: u64, multiplier: f64, cap_ms: u64, jitter_unit: f64) -> u64 {
    let exponent = attempts.saturating_sub(1).max(0);
    #[allow(clippy::cast_precision_loss)]
    let raw = (base_ms as f64) * multiplier.powi(exponent);
    let capped = raw.min(cap_ms as f64);
    let jitter_unit = jitter_unit.clamp(0.0, 1.0);
    let jitter_offset = (jitter_unit * 2.0 - 1.0) * BACKOFF_JITTER_FRACTION;
    let jittered = capped * (1.0 + jitter_offset);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let delay = jittered.max(0.0).round() as u64;
    delay.min(cap_ms)
}

/// Draws a jitter unit in `[0.0, 1.0)` using the process RNG, for
/// production callers of [`backoff_delay_ms`] that don't need determinism.
#[must_use]
pub fn random_jitter_unit() -> f64 {
    rand::random::<f64>()
}

#[cfg(test)]
mod tests {
    use super::BACKOFF_JITTER_FRACTION;
    use super::JobStatus;
    use super::backoff_delay_ms;

    #[test]
    fn queued_can_claim_or_cancel() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Claimed));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn terminal_statuses_accept_no_transitions() {
        for terminal in [JobStatus::Succeeded, JobStatus::Cancelled, JobStatus::DeadLettered] {
            for next in [
                JobStatus::Queued,
                JobStatus::Claimed,
                JobStatus::Running,
                JobStatus::Succeeded,
                JobStatus::Failed,
                JobStatus::Cancelled,
                JobStatus::DeadLettered,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn failed_retries_into_queued_or_dead_letters() {
        assert!(JobStatus::Failed.can_transition_to(JobStatus::Queued));
        assert!(JobStatus::Failed.can_transition_to(JobStatus::DeadLettered));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn backoff_respects_cap() {
        let delay = backoff_delay_ms(10, 1_000, 2.0, 5_000, 0.5);
        assert!(delay <= 5_000);
    }

    #[test]
    fn backoff_grows_with_attempts_before_cap() {
        let first = backoff_delay_ms(1, 1_000, 2.0, 1_000_000, 0.5);
        let second = backoff_delay_ms(2, 1_000, 2.0, 1_000_000, 0.5);
        assert!(second > first);
    }

    #[test]
    fn jitter_bounds_are_respected() {
        let base = 1_000;
        let cap = 1_000_000;
        let unjittered = f64::from(base);
        let low = backoff_delay_ms(1, base, 2.0, cap, 0.0);
        let high = backoff_delay_ms(1, base, 2.0, cap, 1.0);
        let expected_low = (unjittered * (1.0 - BACKOFF_JITTER_FRACTION)).round() as u64;
        let expected_high = (unjittered * (1.0 + BACKOFF_JITTER_FRACTION)).round() as u64;
        assert_eq!(low, expected_low);
        assert_eq!(high, expected_high);
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::backoff_delay_ms;

    proptest! {
        #[test]
        fn delay_never_exceeds_cap(
            attempts in 1i32..20,
            base in 1u64..10_000,
            cap in 1u64..600_000,
            jitter in 0.0f64..1.0,
        ) {
            let delay = backoff_delay_ms(attempts, base, 2.0, cap, jitter);
            prop_assert!(delay <= cap);
        }

        #[test]
        fn delay_is_never_negative_and_fits_u64(
            attempts in 1i32..50,
            base in 0u64..100_000,
            cap in 0u64..1_000_000,
            jitter in 0.0f64..1.0,
        ) {
            let delay = backoff_delay_ms(attempts, base, 2.5, cap, jitter);
            prop_assert!(delay <= cap.max(0));
        }
    }
}
