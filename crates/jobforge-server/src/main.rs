// jobforge-server/src/main.rs
// ============================================================================
// Module: Server Entry Point
// Description: Process init for the worker protocol API.
// Purpose: Load configuration, open the store, register every template's
//          input schema, and serve the router built in jobforge_server::router.
// Dependencies: jobforge-config, jobforge-core, jobforge-schema,
//               jobforge-server, jobforge-store-sqlite, tokio, tracing,
//               tracing-subscriber
// ============================================================================

//! ## Overview
//! Startup order matters: templates must be loaded and their input schemas
//! registered before the router is built, since `RequestJob` validates
//! against whatever the registry holds at call time - there is no lazy
//! registration path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use jobforge_config::JobForgeConfig;
use jobforge_core::store::TemplateRegistryStore;
use jobforge_schema::SchemaRegistry;
use jobforge_server::state::AppState;
use jobforge_store_sqlite::QueueTunables;
use jobforge_store_sqlite::SqliteStore;

/// Process entry point: initializes logging, then runs the server until it
/// exits or fails to start.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!(error = %message, "jobforge-server exited");
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration, opens the store, registers templates, and serves
/// the worker protocol API until the process is terminated.
async fn run() -> Result<(), String> {
    let config = JobForgeConfig::load(None).map_err(|err| err.to_string())?;

    let tunables = QueueTunables {
        lease_duration_ms: config.queue.lease_duration_ms,
        backoff_base_ms: config.queue.backoff_base_ms,
        backoff_multiplier: config.queue.backoff_multiplier,
        backoff_cap_ms: config.queue.backoff_cap_ms,
        claim_fetch_quota: config.queue.claim_fetch_quota,
        default_max_attempts: config.queue.default_max_attempts,
    };
    let store = SqliteStore::open(Path::new(&config.store.database_path), tunables).map_err(|err| err.to_string())?;

    let templates = jobforge_config::load_templates(Path::new(&config.templates_dir)).map_err(|err| err.to_string())?;
    let mut schemas = SchemaRegistry::new();
    for template in &templates {
        #[allow(clippy::cast_sign_loss, reason = "template versions are always non-negative in practice")]
        let version = u32::try_from(template.version).unwrap_or(1);
        schemas
            .register(&template.template_key, version, &template.input_schema)
            .map_err(|err| err.to_string())?;
        store.templates().put_template(template.clone()).map_err(|err| err.to_string())?;
    }
    tracing::info!(count = templates.len(), "templates loaded");

    let state = AppState {
        store,
        schemas: Arc::new(schemas),
        features: config.features,
        queue: config.queue,
    };

    let bind_addr = config.server.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.map_err(|err| err.to_string())?;
    tracing::info!(%bind_addr, "jobforge-server listening");

    let router = jobforge_server::build(state);
    axum::serve(listener, router).await.map_err(|err| err.to_string())
}
