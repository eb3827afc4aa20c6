// jobforge-connectors/src/lib.rs
// ============================================================================
// Module: JobForge Connectors
// Description: The Evidence Builder and Connector Harness, plus the
//              connectors JobForge ships out of the box.
// Purpose: Give every action-job connector a shared retry/backoff/timeout
//          loop and a deterministic, content-hashed evidence trail.
// Dependencies: jobforge-core, tokio, async-trait
// ============================================================================

//! ## Overview
//! A connector implements [`harness::Connector`]; [`harness::ConnectorHarness`]
//! drives it through attempts, and [`evidence::EvidenceBuilder`] assembles
//! the [`jobforge_core::evidence::EvidencePacket`] the harness always
//! returns inside a [`harness::HarnessOutcome`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod connectors;
pub mod evidence;
pub mod harness;

pub use connectors::HelloWorldConnector;
pub use evidence::EvidenceBuilder;
pub use harness::Connector;
pub use harness::ConnectorAttempt;
pub use harness::ConnectorFailure;
pub use harness::ConnectorHarness;
pub use harness::ConnectorResponse;
pub use harness::HarnessOutcome;
