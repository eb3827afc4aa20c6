// jobforge-connectors/src/harness.rs
// ============================================================================
// Module: Connector Harness
// Description: Drives one connector invocation through retries, backoff,
//              and per-attempt timeouts, never panicking or propagating.
// Purpose: Give every connector the same attempt loop and evidence trail,
//          regardless of what the connector itself does.
// Dependencies: jobforge-core (job backoff, error, evidence), tokio
// ============================================================================

//! ## Overview
//! [`ConnectorHarness`] reuses [`jobforge_core::job::backoff_delay_ms`] and
//! [`jobforge_core::job::random_jitter_unit`] verbatim, so a connector's
//! retry schedule reads as the same idiom as the job queue's own retry
//! schedule. Status codes are dispatched into four classes: 2xx succeeds,
//! 429 and 5xx retry (bounded by `max_attempts`), everything else fails
//! immediately. A timed-out attempt is treated the same as a 5xx. `dry_run`
//! short-circuits before any attempt is made.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use jobforge_core::error::ApiError;
use jobforge_core::error::ErrorKind;
use jobforge_core::evidence::EvidencePacket;
use jobforge_core::ids::ConnectorId;
use jobforge_core::ids::ProjectId;
use jobforge_core::ids::TenantId;
use jobforge_core::ids::TraceId;
use jobforge_core::job::backoff_delay_ms;
use jobforge_core::job::random_jitter_unit;
use serde_json::Value;

use crate::evidence::EvidenceBuilder;

// ============================================================================
// SECTION: Connector Trait
// ============================================================================

/// One attempt's outcome from a connector, before the harness classifies it.
#[derive(Debug, Clone)]
pub struct ConnectorResponse {
    /// HTTP-style status code the connector observed or synthesized.
    pub status_code: i32,
    /// Connector output, already redaction-free (the harness does not
    /// redact outputs, only inputs).
    pub output: Value,
}

/// A connector invocation that failed before producing a status-classed
/// response (e.g. a transport error).
#[derive(Debug, Clone)]
pub struct ConnectorFailure {
    /// The error to surface if the harness gives up retrying.
    pub error: ApiError,
}

/// Result of a single connector attempt.
pub type ConnectorAttempt = Result<ConnectorResponse, ConnectorFailure>;

/// A connector the harness can drive through its retry loop.
///
/// # Invariants
/// - `invoke` must not panic; transport and parsing failures convert into
///   [`ConnectorFailure`] instead.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Stable identity of this connector, recorded on the evidence packet.
    fn id(&self) -> ConnectorId;

    /// Executes a single attempt against `input`.
    async fn invoke(&self, input: &Value) -> ConnectorAttempt;
}

// ============================================================================
// SECTION: Status Classification
// ============================================================================

/// The four buckets a connector's status code falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    /// 2xx: the attempt succeeded.
    Success,
    /// 429: rate limited, retryable.
    RateLimited,
    /// 5xx: server error, retryable.
    ServerError,
    /// Any other code: not retryable.
    ClientError,
}

/// Classifies a status code into one of [`StatusClass`]'s four buckets.
const fn classify_status(status_code: i32) -> StatusClass {
    match status_code {
        200..=299 => StatusClass::Success,
        429 => StatusClass::RateLimited,
        500..=599 => StatusClass::ServerError,
        _ => StatusClass::ClientError,
    }
}

// ============================================================================
// SECTION: Harness Outcome
// ============================================================================

/// The envelope the harness always returns, win or lose.
///
/// # Invariants
/// - `evidence` is always present, whether the invocation succeeded,
///   failed, or was a dry run.
#[derive(Debug, Clone)]
pub struct HarnessOutcome {
    /// Whether the invocation ultimately succeeded.
    pub ok: bool,
    /// The connector's output, present only when `ok` is true.
    pub output: Option<Value>,
    /// The terminal error, present only when `ok` is false.
    pub error: Option<ApiError>,
    /// The evidence packet covering every attempt made.
    pub evidence: EvidencePacket,
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Configuration and driver for a connector's retry loop.
#[derive(Debug, Clone, Copy)]
pub struct ConnectorHarness {
    /// Maximum attempts before giving up on a retryable failure.
    pub max_attempts: u32,
    /// Backoff base delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Backoff growth multiplier.
    pub backoff_multiplier: f64,
    /// Backoff cap in milliseconds.
    pub backoff_cap_ms: u64,
    /// Per-attempt timeout in milliseconds.
    pub per_attempt_timeout_ms: u64,
}

impl Default for ConnectorHarness {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 1_000,
            backoff_multiplier: 2.0,
            backoff_cap_ms: 30_000,
            per_attempt_timeout_ms: 10_000,
        }
    }
}

impl ConnectorHarness {
    /// Drives `connector` through its attempt loop against `input`.
    ///
    /// When `dry_run` is true, no attempt is made; the harness reports
    /// success with a `null` output and an evidence packet marked
    /// accordingly.
    pub async fn run(
        &self,
        connector: &dyn Connector,
        trace_id: TraceId,
        tenant_id: TenantId,
        project_id: Option<ProjectId>,
        input: Value,
        dry_run: bool,
    ) -> HarnessOutcome {
        let builder = EvidenceBuilder::construct(connector.id(), trace_id, tenant_id, project_id, &input);

        if dry_run {
            return Self::finish(builder, Ok(Value::Null));
        }

        self.attempt_loop(connector, builder, &input).await
    }

    /// Runs attempts until one succeeds, one fails non-retryably, or
    /// `max_attempts` is exhausted.
    async fn attempt_loop(&self, connector: &dyn Connector, mut builder: EvidenceBuilder, input: &Value) -> HarnessOutcome {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let timeout = Duration::from_millis(self.per_attempt_timeout_ms);

            let outcome = tokio::time::timeout(timeout, connector.invoke(input)).await;

            match outcome {
                Err(_elapsed) => {
                    if attempt >= self.max_attempts {
                        let error = ApiError::new(ErrorKind::Timeout, "connector attempt timed out");
                        return Self::finish(builder, Err(error));
                    }
                    self.retry_after_backoff(&mut builder, attempt).await;
                }
                Ok(Ok(response)) => {
                    builder.record_status(response.status_code);
                    match classify_status(response.status_code) {
                        StatusClass::Success => return Self::finish(builder, Ok(response.output)),
                        StatusClass::RateLimited => {
                            builder.record_rate_limit();
                            if attempt >= self.max_attempts {
                                let error = ApiError::new(ErrorKind::RateLimited, "connector rate limit exhausted retries");
                                return Self::finish(builder, Err(error));
                            }
                            self.retry_after_backoff(&mut builder, attempt).await;
                        }
                        StatusClass::ServerError => {
                            if attempt >= self.max_attempts {
                                let error = ApiError::new(ErrorKind::Internal, format!("connector returned status {}", response.status_code));
                                return Self::finish(builder, Err(error));
                            }
                            self.retry_after_backoff(&mut builder, attempt).await;
                        }
                        StatusClass::ClientError => {
                            let error = ApiError::validation(format!("connector returned status {}", response.status_code));
                            return Self::finish(builder, Err(error));
                        }
                    }
                }
                Ok(Err(failure)) => {
                    if !failure.error.retryable || attempt >= self.max_attempts {
                        return Self::finish(builder, Err(failure.error));
                    }
                    self.retry_after_backoff(&mut builder, attempt).await;
                }
            }
        }
    }

    /// Records and sleeps through one backoff interval before the next
    /// attempt.
    async fn retry_after_backoff(&self, builder: &mut EvidenceBuilder, attempt: u32) {
        let attempts = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = backoff_delay_ms(
            attempts,
            self.backoff_base_ms,
            self.backoff_multiplier,
            self.backoff_cap_ms,
            random_jitter_unit(),
        );
        builder.record_retry(delay_ms);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    /// Consumes the builder into a terminal [`HarnessOutcome`], never
    /// panicking even if hashing the evidence fails.
    fn finish(builder: EvidenceBuilder, result: Result<Value, ApiError>) -> HarnessOutcome {
        let (connector_id, trace_id, tenant_id) = builder.identity();
        match result {
            Ok(output) => match builder.finish_success(&output) {
                Ok(evidence) => HarnessOutcome {
                    ok: true,
                    output: Some(output),
                    error: None,
                    evidence,
                },
                Err(hash_error) => HarnessOutcome {
                    ok: false,
                    output: None,
                    error: Some(ApiError::internal(hash_error.to_string())),
                    evidence: EvidencePacket::unrecoverable(connector_id, trace_id, tenant_id, hash_error.to_string()),
                },
            },
            Err(error) => match builder.finish_failure(error.clone()) {
                Ok(evidence) => HarnessOutcome {
                    ok: false,
                    output: None,
                    error: Some(error),
                    evidence,
                },
                Err(hash_error) => HarnessOutcome {
                    ok: false,
                    output: None,
                    error: Some(error),
                    evidence: EvidencePacket::unrecoverable(connector_id, trace_id, tenant_id, hash_error.to_string()),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    use jobforge_core::ids::ConnectorId;
    use jobforge_core::ids::TenantId;
    use jobforge_core::ids::TraceId;
    use serde_json::json;

    use super::Connector;
    use super::ConnectorAttempt;
    use super::ConnectorFailure;
    use super::ConnectorHarness;
    use super::ConnectorResponse;
    use jobforge_core::error::ApiError;
    use jobforge_core::error::ErrorKind;

    struct AlwaysSucceeds;

    #[async_trait::async_trait]
    impl Connector for AlwaysSucceeds {
        fn id(&self) -> ConnectorId {
            ConnectorId::new("always_succeeds")
        }

        async fn invoke(&self, _input: &serde_json::Value) -> ConnectorAttempt {
            Ok(ConnectorResponse {
                status_code: 200,
                output: json!({"ok": true}),
            })
        }
    }

    struct FailsThenSucceeds {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Connector for FailsThenSucceeds {
        fn id(&self) -> ConnectorId {
            ConnectorId::new("flaky")
        }

        async fn invoke(&self, _input: &serde_json::Value) -> ConnectorAttempt {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Ok(ConnectorResponse {
                    status_code: 503,
                    output: json!(null),
                })
            } else {
                Ok(ConnectorResponse {
                    status_code: 200,
                    output: json!({"recovered": true}),
                })
            }
        }
    }

    struct AlwaysClientError;

    #[async_trait::async_trait]
    impl Connector for AlwaysClientError {
        fn id(&self) -> ConnectorId {
            ConnectorId::new("bad_request")
        }

        async fn invoke(&self, _input: &serde_json::Value) -> ConnectorAttempt {
            Ok(ConnectorResponse {
                status_code: 400,
                output: json!(null),
            })
        }
    }

    struct AlwaysTransportFailure;

    #[async_trait::async_trait]
    impl Connector for AlwaysTransportFailure {
        fn id(&self) -> ConnectorId {
            ConnectorId::new("unreachable")
        }

        async fn invoke(&self, _input: &serde_json::Value) -> ConnectorAttempt {
            Err(ConnectorFailure {
                error: ApiError::new(ErrorKind::Internal, "connection refused"),
            })
        }
    }

    fn harness() -> ConnectorHarness {
        ConnectorHarness {
            max_attempts: 3,
            backoff_base_ms: 1,
            backoff_multiplier: 2.0,
            backoff_cap_ms: 5,
            per_attempt_timeout_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn dry_run_short_circuits_without_invoking_connector() {
        let outcome = harness()
            .run(
                &AlwaysSucceeds,
                TraceId::new("t1"),
                TenantId::new("acme"),
                None,
                json!({}),
                true,
            )
            .await;
        assert!(outcome.ok);
        assert_eq!(outcome.output, Some(json!(null)));
        assert_eq!(outcome.evidence.retries, 0);
    }

    #[tokio::test]
    async fn success_on_first_attempt_records_no_retries() {
        let outcome = harness()
            .run(
                &AlwaysSucceeds,
                TraceId::new("t1"),
                TenantId::new("acme"),
                None,
                json!({}),
                false,
            )
            .await;
        assert!(outcome.ok);
        assert_eq!(outcome.evidence.retries, 0);
        assert_eq!(outcome.evidence.status_codes, vec![200]);
    }

    #[tokio::test]
    async fn server_error_retries_then_succeeds() {
        let connector = FailsThenSucceeds { calls: AtomicU32::new(0) };
        let outcome = harness()
            .run(&connector, TraceId::new("t1"), TenantId::new("acme"), None, json!({}), false)
            .await;
        assert!(outcome.ok);
        assert_eq!(outcome.evidence.retries, 1);
        assert_eq!(outcome.evidence.status_codes, vec![503, 200]);
    }

    #[tokio::test]
    async fn client_error_fails_without_retry() {
        let outcome = harness()
            .run(&AlwaysClientError, TraceId::new("t1"), TenantId::new("acme"), None, json!({}), false)
            .await;
        assert!(!outcome.ok);
        assert_eq!(outcome.evidence.retries, 0);
        assert_eq!(outcome.error.expect("error").kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn transport_failure_exhausts_retries_then_fails() {
        let outcome = harness()
            .run(
                &AlwaysTransportFailure,
                TraceId::new("t1"),
                TenantId::new("acme"),
                None,
                json!({}),
                false,
            )
            .await;
        assert!(!outcome.ok);
        assert_eq!(outcome.evidence.retries, 2);
        assert_eq!(outcome.error.expect("error").kind, ErrorKind::Internal);
    }
}
