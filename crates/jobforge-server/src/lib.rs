// jobforge-server/src/lib.rs
// ============================================================================
// Module: JobForge Server
// Description: The worker protocol API binary's library half.
// Purpose: Expose the router builder and app state so `main` stays a thin
//          wiring layer and integration tests can build the same router.
// Dependencies: axum, jobforge-config, jobforge-core, jobforge-policy,
//               jobforge-schema, jobforge-store-sqlite
// ============================================================================

//! ## Overview
//! `jobforge-server` implements spec.md 4.K, the Worker Protocol API: a
//! thin HTTP boundary over the job queue, event store, template compiler,
//! and manifest store already implemented by `jobforge-core`,
//! `jobforge-store-sqlite`, and `jobforge-policy`. Every handler follows
//! the same shape - parse request, resolve `x-trace-id`, call the store,
//! render through [`error::respond`] - so the RPC surface in [`router`]
//! is the map of what this crate actually does.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod events;
pub mod jobs;
pub mod manifests;
pub mod router;
pub mod state;
pub mod templates;
pub mod wire;

pub use router::build;
pub use state::AppState;
