// jobforge-core/src/ids.rs
// ============================================================================
// Module: JobForge Identifiers
// Description: Canonical opaque identifiers shared across the execution
//              plane.
// Purpose: Provide strongly typed, serializable IDs with stable string
//          forms so every table and RPC boundary agrees on shape.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Identifiers are opaque and serialize as strings (or, for generated IDs,
//! as UUID strings). Validation beyond "non-empty" is handled at the schema
//! or store boundary rather than within these wrappers, matching the rest of
//! the crate's fail-closed-at-the-boundary posture.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: String Identifier Macro
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner `String`.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Tenant identifier scoping every row in the execution plane.
    ///
    /// # Invariants
    /// - No query or mutation ever crosses a `TenantId` boundary.
    TenantId
);

string_id!(
    /// Optional project scope within a tenant, carried by events.
    ProjectId
);

string_id!(
    /// Trace identifier propagated through a single external request and
    /// every job/event it causes.
    TraceId
);

string_id!(
    /// Correlation identifier linking an event to the job it triggered.
    CorrelationId
);

string_id!(
    /// Worker process identifier presented on claim/heartbeat/complete.
    WorkerId
);

string_id!(
    /// Template registry key (stable across versions).
    TemplateKey
);

string_id!(
    /// Actor identifier for audited admin-visible operations.
    ActorId
);

string_id!(
    /// Connector identifier used by the connector harness and evidence
    /// packets.
    ConnectorId
);

// ============================================================================
// SECTION: UUID Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

uuid_id!(
    /// Job identifier, also used as the run id for the job's manifest.
    JobId
);

uuid_id!(
    /// Event identifier.
    EventId
);

#[cfg(test)]
mod tests {
    use super::TenantId;

    #[test]
    fn round_trips_through_json() {
        let tenant = TenantId::new("acme");
        let json = serde_json::to_string(&tenant).expect("serialize");
        assert_eq!(json, "\"acme\"");
        let parsed: TenantId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, tenant);
    }

    #[test]
    fn display_matches_as_str() {
        let tenant = TenantId::new("acme");
        assert_eq!(tenant.to_string(), tenant.as_str());
    }
}
