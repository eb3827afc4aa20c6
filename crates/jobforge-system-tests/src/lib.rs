// jobforge-system-tests/src/lib.rs
// ============================================================================
// Module: System Tests
// Description: No library surface of its own; exists so `tests/` has a
//              crate to attach to.
// Purpose: Host spec.md 8's end-to-end scenarios as integration tests,
//          without forcing every other crate to depend on tokio's full
//          feature set or jobforge-connectors at library build time.
// ============================================================================

//! ## Overview
//! See `tests/scenarios.rs` for the scenarios themselves (spec.md 8, S1-S6).
