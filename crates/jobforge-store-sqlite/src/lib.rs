// jobforge-store-sqlite/src/lib.rs
// ============================================================================
// Module: JobForge SQLite Store
// Description: Durable, single-file SQLite backend for every jobforge-core
//              store trait.
// Purpose: Compose the connection/schema module with one implementation
//          struct per trait, then expose a single SqliteStore that wires
//          them all to the same shared connection.
// Dependencies: jobforge-core, rusqlite
// ============================================================================

//! ## Overview
//! `jobforge-store-sqlite` is JobForge's only storage backend today. Every
//! table lives behind one `SQLite` connection guarded by a mutex (see
//! [`conn`]); [`SqliteStore`] hands out cloneable, trait-object-friendly
//! handles to each table so callers can depend on `jobforge-core`'s traits
//! rather than this crate directly, leaving room for a second backend (e.g.
//! Postgres) without touching call sites.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod conn;
pub mod events;
pub mod manifests;
pub mod policy;
pub mod queue;
pub mod templates;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

pub use audit::SqliteAuditLogStore;
use conn::StoreOpenError;
pub use events::SqliteEventStore;
pub use manifests::SqliteManifestStore;
pub use policy::SqlitePolicyTokenStore;
pub use queue::SqliteJobStore;
use rusqlite::Connection;
pub use templates::SqliteTemplateStore;

// ============================================================================
// SECTION: Queue Tunables
// ============================================================================

/// Tunables for [`SqliteJobStore`], normally sourced from `jobforge-config`.
#[derive(Debug, Clone, Copy)]
pub struct QueueTunables {
    /// Worker lease duration in milliseconds.
    pub lease_duration_ms: u64,
    /// Backoff base delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Backoff growth multiplier.
    pub backoff_multiplier: f64,
    /// Backoff cap in milliseconds.
    pub backoff_cap_ms: u64,
    /// Maximum jobs claimed per tenant per `ClaimJobs` round.
    pub claim_fetch_quota: u32,
    /// Default `max_attempts` when a caller does not specify one.
    pub default_max_attempts: i32,
}

impl Default for QueueTunables {
    fn default() -> Self {
        Self {
            lease_duration_ms: u64::try_from(jobforge_core::job::DEFAULT_LEASE_DURATION_MS).unwrap_or(60_000),
            backoff_base_ms: jobforge_core::job::DEFAULT_BACKOFF_BASE_MS,
            backoff_multiplier: jobforge_core::job::DEFAULT_BACKOFF_MULTIPLIER,
            backoff_cap_ms: jobforge_core::job::DEFAULT_BACKOFF_CAP_MS,
            claim_fetch_quota: 50,
            default_max_attempts: jobforge_core::job::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Owns the shared `SQLite` connection and hands out one handle per table.
///
/// Each handle (e.g. [`SqliteJobStore`]) is cheaply [`Clone`] and implements
/// the matching `jobforge-core` trait, so callers can hold only the trait
/// they need.
#[derive(Clone)]
pub struct SqliteStore {
    /// Job queue handle.
    jobs: SqliteJobStore,
    /// Event store handle.
    events: SqliteEventStore,
    /// Template registry handle.
    templates: SqliteTemplateStore,
    /// Policy token store handle.
    policy_tokens: SqlitePolicyTokenStore,
    /// Audit log handle.
    audit_log: SqliteAuditLogStore,
    /// Manifest store handle.
    manifests: SqliteManifestStore,
}

impl SqliteStore {
    /// Opens (or creates) a `SQLite` database file at `path` and wires up
    /// every table handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreOpenError`] if the database cannot be opened or its
    /// schema cannot be initialized.
    pub fn open(path: &Path, tunables: QueueTunables) -> Result<Self, StoreOpenError> {
        let connection = conn::open(path, conn::DEFAULT_BUSY_TIMEOUT_MS)?;
        Ok(Self::from_connection(connection, tunables))
    }

    /// Opens an in-memory database, primarily for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreOpenError`] if the schema cannot be initialized.
    pub fn open_in_memory(tunables: QueueTunables) -> Result<Self, StoreOpenError> {
        let connection = conn::open_in_memory()?;
        Ok(Self::from_connection(connection, tunables))
    }

    /// Wraps an already-open connection and wires every table handle to it.
    fn from_connection(connection: Connection, tunables: QueueTunables) -> Self {
        let connection = Arc::new(Mutex::new(connection));
        Self {
            jobs: SqliteJobStore::new(
                Arc::clone(&connection),
                tunables.lease_duration_ms,
                tunables.backoff_base_ms,
                tunables.backoff_multiplier,
                tunables.backoff_cap_ms,
                tunables.claim_fetch_quota,
                tunables.default_max_attempts,
            ),
            events: SqliteEventStore::new(Arc::clone(&connection)),
            templates: SqliteTemplateStore::new(Arc::clone(&connection)),
            policy_tokens: SqlitePolicyTokenStore::new(Arc::clone(&connection)),
            audit_log: SqliteAuditLogStore::new(Arc::clone(&connection)),
            manifests: SqliteManifestStore::new(connection),
        }
    }

    /// Returns a handle implementing [`jobforge_core::JobStore`].
    #[must_use]
    pub fn jobs(&self) -> SqliteJobStore {
        self.jobs.clone()
    }

    /// Returns a handle implementing [`jobforge_core::EventStore`].
    #[must_use]
    pub fn events(&self) -> SqliteEventStore {
        self.events.clone()
    }

    /// Returns a handle implementing [`jobforge_core::TemplateRegistryStore`].
    #[must_use]
    pub fn templates(&self) -> SqliteTemplateStore {
        self.templates.clone()
    }

    /// Returns a handle implementing [`jobforge_core::PolicyTokenStore`].
    #[must_use]
    pub fn policy_tokens(&self) -> SqlitePolicyTokenStore {
        self.policy_tokens.clone()
    }

    /// Returns a handle implementing [`jobforge_core::AuditLogStore`].
    #[must_use]
    pub fn audit_log(&self) -> SqliteAuditLogStore {
        self.audit_log.clone()
    }

    /// Returns a handle implementing [`jobforge_core::ManifestStore`].
    #[must_use]
    pub fn manifests(&self) -> SqliteManifestStore {
        self.manifests.clone()
    }
}
