// jobforge-connectors/src/connectors/mod.rs
// ============================================================================
// Module: Built-in Connectors
// Description: Connector implementations shipped with JobForge itself.
// Purpose: Group concrete Connector impls separately from the harness that
//          drives them.
// ============================================================================

pub mod hello_world;

pub use hello_world::HelloWorldConnector;
