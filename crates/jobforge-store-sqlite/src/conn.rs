// jobforge-store-sqlite/src/conn.rs
// ============================================================================
// Module: SQLite Connection & Schema
// Description: Connection setup and schema initialization shared by every
//              table the store manages.
// Purpose: Centralize pragma configuration and `CREATE TABLE` statements so
//          every table lives behind one durability policy.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! The store opens a single `SQLite` connection per process, guarded by a
//! mutex, with WAL journaling and a busy timeout so concurrent worker
//! access serializes through SQLite's writer lock rather than failing with
//! `SQLITE_BUSY`. All tables share this one connection and are created (if
//! absent) on [`open`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version recorded in `store_meta`.
pub(crate) const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while opening or initializing the store.
#[derive(Debug, Error)]
pub enum StoreOpenError {
    /// The database file or its parent directory could not be prepared.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// The `SQLite` engine rejected the connection or a schema statement.
    #[error("sqlite store db error: {0}")]
    Db(String),
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Opens a `SQLite` connection at `path` with WAL journaling, `BEGIN
/// IMMEDIATE`-friendly busy timeout, and foreign keys enabled, then
/// initializes every table the store needs.
///
/// # Errors
///
/// Returns [`StoreOpenError`] when the parent directory cannot be created,
/// the connection cannot be opened, or a schema statement fails.
pub fn open(path: &Path, busy_timeout_ms: u64) -> Result<Connection, StoreOpenError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| StoreOpenError::Io(err.to_string()))?;
    }
    let flags =
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(path, flags).map_err(|err| StoreOpenError::Db(err.to_string()))?;
    apply_pragmas(&connection, busy_timeout_ms)?;
    initialize_schema(&connection)?;
    Ok(connection)
}

/// Opens an in-memory store, primarily for tests.
///
/// # Errors
///
/// Returns [`StoreOpenError`] when the connection cannot be opened or a
/// schema statement fails.
pub fn open_in_memory() -> Result<Connection, StoreOpenError> {
    let connection = Connection::open_in_memory().map_err(|err| StoreOpenError::Db(err.to_string()))?;
    apply_pragmas(&connection, DEFAULT_BUSY_TIMEOUT_MS)?;
    initialize_schema(&connection)?;
    Ok(connection)
}

/// Applies the durability pragmas shared by every connection this store opens.
fn apply_pragmas(connection: &Connection, busy_timeout_ms: u64) -> Result<(), StoreOpenError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| StoreOpenError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA journal_mode = WAL;")
        .map_err(|err| StoreOpenError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA synchronous = NORMAL;")
        .map_err(|err| StoreOpenError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(busy_timeout_ms))
        .map_err(|err| StoreOpenError::Db(err.to_string()))?;
    Ok(())
}

/// Creates every table and index this store needs, if absent, and records
/// the schema version.
fn initialize_schema(connection: &Connection) -> Result<(), StoreOpenError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);

             CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                job_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                idempotency_key TEXT,
                status TEXT NOT NULL,
                run_at TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                max_attempts INTEGER NOT NULL,
                last_error TEXT,
                claimed_by TEXT,
                lease_expires_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
             );
             CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_idempotency
                ON jobs (tenant_id, job_type, idempotency_key)
                WHERE idempotency_key IS NOT NULL;
             CREATE INDEX IF NOT EXISTS idx_jobs_claim_order
                ON jobs (status, run_at, created_at);
             CREATE INDEX IF NOT EXISTS idx_jobs_tenant
                ON jobs (tenant_id, created_at);
             CREATE INDEX IF NOT EXISTS idx_jobs_lease
                ON jobs (status, lease_expires_at);

             CREATE TABLE IF NOT EXISTS job_results (
                job_id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                status TEXT NOT NULL,
                result TEXT,
                error TEXT,
                artifact_ref TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (job_id) REFERENCES jobs(id)
             );

             CREATE TABLE IF NOT EXISTS job_attempts (
                job_id TEXT NOT NULL,
                attempt_no INTEGER NOT NULL,
                worker_id TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                outcome TEXT,
                PRIMARY KEY (job_id, attempt_no),
                FOREIGN KEY (job_id) REFERENCES jobs(id)
             );

             CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                project_id TEXT,
                event_version INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                occurred_at TEXT NOT NULL,
                trace_id TEXT NOT NULL,
                source_app TEXT NOT NULL,
                source_module TEXT,
                subject_type TEXT,
                subject_id TEXT,
                payload TEXT NOT NULL,
                contains_pii INTEGER NOT NULL,
                redaction_hints TEXT NOT NULL,
                processed INTEGER NOT NULL,
                processing_job_id TEXT,
                created_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_events_tenant
                ON events (tenant_id, created_at);
             CREATE INDEX IF NOT EXISTS idx_events_type
                ON events (tenant_id, event_type);

             CREATE TABLE IF NOT EXISTS templates (
                template_key TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                category TEXT NOT NULL,
                input_schema TEXT NOT NULL,
                output_schema TEXT NOT NULL,
                required_scopes TEXT NOT NULL,
                required_connectors TEXT NOT NULL,
                estimated_cost_tier TEXT NOT NULL,
                default_max_attempts INTEGER NOT NULL,
                default_timeout_ms INTEGER NOT NULL,
                is_action_job INTEGER NOT NULL,
                enabled INTEGER NOT NULL
             );

             CREATE TABLE IF NOT EXISTS policy_tokens (
                token_hash TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                scopes TEXT NOT NULL,
                issued_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                single_use INTEGER NOT NULL,
                consumed_at TEXT
             );

             CREATE TABLE IF NOT EXISTS audit_log (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                actor_id TEXT,
                action TEXT NOT NULL,
                subject_type TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                trace_id TEXT NOT NULL,
                occurred_at TEXT NOT NULL,
                metadata TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_audit_tenant
                ON audit_log (tenant_id, occurred_at);

             CREATE TABLE IF NOT EXISTS manifests (
                run_id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                job_type TEXT NOT NULL,
                outputs TEXT NOT NULL,
                metrics TEXT NOT NULL,
                env_fingerprint TEXT NOT NULL,
                tool_versions TEXT NOT NULL,
                inputs_snapshot_ref TEXT,
                logs_ref TEXT,
                status TEXT NOT NULL,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_manifests_tenant
                ON manifests (tenant_id, created_at);",
        )
        .map_err(|err| StoreOpenError::Db(err.to_string()))?;

    let version: Option<i64> = connection
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .ok();
    if version.is_none() {
        connection
            .execute("INSERT INTO store_meta (version) VALUES (?1)", [SCHEMA_VERSION])
            .map_err(|err| StoreOpenError::Db(err.to_string()))?;
    }
    Ok(())
}
