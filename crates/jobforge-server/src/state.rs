// jobforge-server/src/state.rs
// ============================================================================
// Module: Server State
// Description: The shared, cloneable handle every handler receives.
// Purpose: Wire the SQLite store, the schema registry, and feature flags
//          into axum's extractor state without a global mutable config.
// Dependencies: axum, jobforge-config, jobforge-core, jobforge-schema,
//               jobforge-store-sqlite
// ============================================================================

//! ## Overview
//! [`AppState`] is built once at process init (see `main`) and cloned into
//! every request; every field is cheap to clone (an `Arc` or a handle
//! wrapping one internally) so no handler blocks another on state access.
//! Feature flags are the immutable configuration value built at startup,
//! not a global - matching the source's shared-mutable-module-state
//! redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use jobforge_config::FeatureFlags;
use jobforge_config::QueueConfig;
use jobforge_schema::SchemaRegistry;
use jobforge_store_sqlite::SqliteStore;

// ============================================================================
// SECTION: App State
// ============================================================================

/// Shared state injected into every axum handler.
#[derive(Clone)]
pub struct AppState {
    /// The SQLite-backed implementation of every `jobforge-core` store trait.
    pub store: SqliteStore,
    /// Compiled input schemas, keyed by `(template_key, version)`.
    pub schemas: Arc<SchemaRegistry>,
    /// Process-wide feature flags.
    pub features: FeatureFlags,
    /// Queue tunables, used to fill `default_max_attempts` on raw enqueues.
    pub queue: QueueConfig,
}
