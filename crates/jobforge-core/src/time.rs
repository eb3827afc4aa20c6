// jobforge-core/src/time.rs
// ============================================================================
// Module: JobForge Timestamps
// Description: Canonical timestamp representation for the execution plane.
// Purpose: Provide a single serializable timestamp type used by every row
//          and wire payload.
// Dependencies: time, serde
// ============================================================================

//! ## Overview
//! All timestamps in JobForge are RFC 3339 strings with sub-second precision,
//! stored verbatim in SQLite text columns and echoed verbatim on the wire.
//! Arithmetic (lease extension, backoff scheduling) goes through explicit
//! helpers rather than ad-hoc duration math scattered across call sites.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// A UTC timestamp with RFC 3339 serialization.
///
/// # Invariants
/// - Always normalized to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Wraps an existing offset date-time, normalizing to UTC.
    #[must_use]
    pub fn from_offset(value: OffsetDateTime) -> Self {
        Self(value.to_offset(time::UtcOffset::UTC))
    }

    /// Returns a timestamp shifted by the given number of milliseconds
    /// (negative shifts into the past).
    #[must_use]
    pub fn plus_millis(self, millis: i64) -> Self {
        Self(self.0 + Duration::milliseconds(millis))
    }

    /// Returns true when this timestamp is strictly before `other`.
    #[must_use]
    pub fn is_before(self, other: Self) -> bool {
        self.0 < other.0
    }

    /// Returns the underlying `OffsetDateTime`.
    #[must_use]
    pub const fn as_offset(&self) -> OffsetDateTime {
        self.0
    }

    /// Formats the timestamp as RFC 3339.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying formatter fails, which only
    /// happens for dates outside the representable range.
    pub fn to_rfc3339(self) -> Result<String, time::error::Format> {
        self.0.format(&Rfc3339)
    }

    /// Parses an RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error when `value` is not valid RFC 3339.
    pub fn parse_rfc3339(value: &str) -> Result<Self, time::error::Parse> {
        OffsetDateTime::parse(value, &Rfc3339).map(Self::from_offset)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(text) => f.write_str(&text),
            Err(_) => f.write_str("invalid-timestamp"),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let text = self
            .to_rfc3339()
            .map_err(|err| serde::ser::Error::custom(err.to_string()))?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Self::parse_rfc3339(&text).map_err(|err| serde::de::Error::custom(err.to_string()))
    }
}
