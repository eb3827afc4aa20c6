// jobforge-system-tests/tests/scenarios.rs
// ============================================================================
// Module: End-to-End Scenarios
// Description: Literal-value reproductions of spec.md 8's S1-S6 scenarios.
// Purpose: Exercise the job queue, policy gate, evidence builder, and
//          redactor together the way an operator would observe them,
//          rather than unit-by-unit.
// Dependencies: jobforge-connectors, jobforge-core, jobforge-policy,
//               jobforge-schema, jobforge-store-sqlite
// ============================================================================

use jobforge_connectors::Connector;
use jobforge_connectors::ConnectorHarness;
use jobforge_connectors::HelloWorldConnector;
use jobforge_core::canon::HashAlgorithm;
use jobforge_core::canon::hash_canonical_json;
use jobforge_core::error::ErrorKind;
use jobforge_core::ids::ProjectId;
use jobforge_core::ids::TenantId;
use jobforge_core::ids::TraceId;
use jobforge_core::ids::WorkerId;
use jobforge_core::job::JobOutcome;
use jobforge_core::job::JobStatus;
use jobforge_core::redact::Redactor;
use jobforge_core::store::JobListFilters;
use jobforge_core::store::JobStore;
use jobforge_core::store::TemplateRegistryStore;
use jobforge_core::template::CostTier;
use jobforge_core::template::Template;
use jobforge_core::template::TemplateCategory;
use jobforge_core::time::Timestamp;
use jobforge_policy::RequestJobParams;
use jobforge_policy::TemplateCompiler;
use jobforge_schema::SchemaRegistry;
use jobforge_store_sqlite::QueueTunables;
use jobforge_store_sqlite::SqliteStore;
use serde_json::json;

/// S1 Idempotent enqueue. Two `Enqueue` calls sharing `(tenant, type, key)`
/// resolve to the same job id and leave exactly one row behind.
#[test]
fn s1_idempotent_enqueue() {
    let store = SqliteStore::open_in_memory(QueueTunables::default()).expect("open store");
    let tenant = TenantId::new("T");

    let first = store
        .jobs()
        .enqueue(&tenant, "echo", json!({"v": 1}), Some("K"), None, None)
        .expect("first enqueue");
    let second = store
        .jobs()
        .enqueue(&tenant, "echo", json!({"v": 1}), Some("K"), None, None)
        .expect("second enqueue");

    assert_eq!(first.id, second.id);

    let rows = store
        .jobs()
        .list_jobs(
            &tenant,
            &JobListFilters {
                job_type: Some("echo".to_string()),
                limit: 100,
                ..Default::default()
            },
        )
        .expect("list jobs");
    let matching: Vec<_> = rows.iter().filter(|job| job.idempotency_key.as_deref() == Some("K")).collect();
    assert_eq!(matching.len(), 1);
}

/// S2 Claim fairness. Tenant B's single job must surface within the first
/// two ten-job batches claimed against a 100-job tenant A queue.
#[test]
fn s2_claim_fairness() {
    let store = SqliteStore::open_in_memory(QueueTunables::default()).expect("open store");
    let tenant_a = TenantId::new("A");
    let tenant_b = TenantId::new("B");

    for _ in 0..100 {
        store.jobs().enqueue(&tenant_a, "echo", json!({}), None, None, None).expect("enqueue a");
    }
    store.jobs().enqueue(&tenant_b, "echo", json!({}), None, None, None).expect("enqueue b");

    let worker = WorkerId::new("w1");
    let first_batch = store.jobs().claim_jobs(&worker, 10).expect("claim batch 1");
    let second_batch = store.jobs().claim_jobs(&worker, 10).expect("claim batch 2");

    let seen_tenant_b = first_batch
        .iter()
        .chain(second_batch.iter())
        .any(|job| job.tenant_id == tenant_b);
    assert!(seen_tenant_b, "tenant B's job did not appear in the first two claim batches");
}

/// S3 Lease expiry recovery. An unresponsive worker's claim is reaped, a
/// second worker claims and completes the job, and the first worker's late
/// `CompleteJob` call is rejected as `not_owner`.
#[test]
fn s3_lease_expiry_recovery() {
    let tunables = QueueTunables {
        lease_duration_ms: 1_000,
        ..QueueTunables::default()
    };
    let store = SqliteStore::open_in_memory(tunables).expect("open store");
    let tenant = TenantId::new("T");
    let worker_1 = WorkerId::new("w1");
    let worker_2 = WorkerId::new("w2");

    let job = store.jobs().enqueue(&tenant, "echo", json!({}), None, None, None).expect("enqueue");
    let claimed = store.jobs().claim_jobs(&worker_1, 10).expect("w1 claims");
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, job.id);

    let well_past_lease = Timestamp::now().plus_millis(60_000);
    let reaped = store.jobs().reap_expired_leases(well_past_lease).expect("reap");
    assert_eq!(reaped, 1);

    let reclaimed = store.jobs().claim_jobs(&worker_2, 10).expect("w2 claims");
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, job.id);

    store
        .jobs()
        .complete_job(job.id, &worker_2, JobOutcome::Succeeded, None, Some(json!({"ok": true})), None)
        .expect("w2 completes");

    let late_complete = store
        .jobs()
        .complete_job(job.id, &worker_1, JobOutcome::Succeeded, None, Some(json!({"ok": true})), None);
    let err = late_complete.expect_err("w1's late completion must be rejected");
    assert_eq!(err.kind, ErrorKind::NotOwner);

    let result = store.jobs().get_result(job.id, &tenant).expect("result exists");
    assert_eq!(result.status, JobOutcome::Succeeded);
    let final_job = store.jobs().get_job(job.id, &tenant).expect("job exists");
    assert_eq!(final_job.status, JobStatus::Succeeded);
}

/// S4 Action job denied. `RequestJob` against an action-job template
/// without a policy token is refused before any job row is written, and
/// exactly one `policy_denied` audit entry is recorded.
#[test]
fn s4_action_job_denied() {
    let store = SqliteStore::open_in_memory(QueueTunables::default()).expect("open store");
    let tenant = TenantId::new("acme");
    store
        .templates()
        .put_template(Template {
            template_key: "autopilot.ops.apply".to_string(),
            version: 1,
            category: TemplateCategory::Ops,
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            required_scopes: vec!["autopilot.ops.apply".to_string()],
            required_connectors: vec![],
            estimated_cost_tier: CostTier::Medium,
            default_max_attempts: 5,
            default_timeout_ms: 30_000,
            is_action_job: true,
            enabled: true,
        })
        .expect("seed template");

    let schemas = SchemaRegistry::new();
    let compiler = TemplateCompiler {
        templates: &store.templates(),
        jobs: &store.jobs(),
        policy_tokens: &store.policy_tokens(),
        audit_log: &store.audit_log(),
        schemas: &schemas,
    };

    let result = compiler.request_job(RequestJobParams {
        tenant_id: tenant.clone(),
        template_key: "autopilot.ops.apply".to_string(),
        inputs: json!({}),
        project_id: None,
        trace_id: None,
        actor_id: None,
        dry_run: false,
        policy_token: None,
    });

    let err = result.expect_err("expected policy_denied");
    assert_eq!(err.kind, ErrorKind::PolicyDenied);

    assert!(store.jobs().list_jobs(&tenant, &JobListFilters::default()).expect("list jobs").is_empty());

    let audit_rows = store.audit_log().list(&tenant, 10).expect("list audit");
    let denied: Vec<_> = audit_rows
        .iter()
        .filter(|entry| entry.action == jobforge_core::audit::AuditAction::PolicyDenied)
        .collect();
    assert_eq!(denied.len(), 1);
}

/// S5 Deterministic evidence. Running `hello_world` twice with identical
/// input produces an identical `evidence_hash`, and `output_hash` matches
/// the canonical hash of the expected output.
#[tokio::test]
async fn s5_deterministic_evidence() {
    let harness = ConnectorHarness::default();
    let input = json!({"message": "Hello", "echo": true, "delay_ms": 0});

    let run = || {
        let harness = harness;
        let input = input.clone();
        async move {
            harness
                .run(
                    &HelloWorldConnector,
                    TraceId::new("trace-s5"),
                    TenantId::new("acme"),
                    None::<ProjectId>,
                    input,
                    false,
                )
                .await
        }
    };

    let first = run().await;
    let second = run().await;

    assert!(first.ok);
    assert!(second.ok);
    assert_eq!(first.evidence.evidence_hash, second.evidence.evidence_hash);

    let expected_output = json!({"message": "Hello World!", "echoed": true, "delay_used": 0});
    let expected_hash = hash_canonical_json(HashAlgorithm::Sha256, &expected_output).expect("hash expected output").value;
    assert_eq!(first.evidence.output_hash.as_deref(), Some(expected_hash.as_str()));
}

/// S6 Redaction. Redacting a value with secret-shaped keys at any depth
/// replaces them with a redaction marker, and scanning the redacted result
/// finds no leaks. `api_key`/`token` resolve to the `key` category marker
/// rather than the bare default marker - see [`MarkerCategory`].
#[test]
fn s6_redaction() {
    let redactor = Redactor::with_defaults();
    let input = json!({
        "user_id": "u",
        "api_key": "sk-abc",
        "nested": {"token": "t"},
    });

    let redacted = redactor.redact(&input);

    assert_eq!(
        redacted,
        json!({
            "user_id": "u",
            "api_key": "[REDACTED:key]",
            "nested": {"token": "[REDACTED:key]"},
        })
    );
    assert!(redactor.scan(&redacted).is_empty());
}
