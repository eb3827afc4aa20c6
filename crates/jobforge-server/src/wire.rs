// jobforge-server/src/wire.rs
// ============================================================================
// Module: Wire Helpers
// Description: Small conversions shared by every handler module.
// Purpose: Parse path-carried ids and enforce feature-flag gates the same
//          way at every endpoint, rather than re-deriving the error shape
//          per handler.
// Dependencies: jobforge-core (error, ids)
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use jobforge_core::error::ApiError;
use jobforge_core::error::ErrorKind;
use jobforge_core::ids::EventId;
use jobforge_core::ids::JobId;
use uuid::Uuid;

// ============================================================================
// SECTION: Id Parsing
// ============================================================================

/// Parses a path-carried job id.
///
/// # Errors
///
/// Returns [`ApiError::validation`] if `raw` is not a well-formed UUID.
pub fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    Uuid::parse_str(raw)
        .map(JobId::from_uuid)
        .map_err(|_| ApiError::validation(format!("{raw} is not a valid job id")))
}

/// Parses a path-carried event id.
///
/// # Errors
///
/// Returns [`ApiError::validation`] if `raw` is not a well-formed UUID.
pub fn parse_event_id(raw: &str) -> Result<EventId, ApiError> {
    Uuid::parse_str(raw)
        .map(EventId::from_uuid)
        .map_err(|_| ApiError::validation(format!("{raw} is not a valid event id")))
}

// ============================================================================
// SECTION: Feature Gates
// ============================================================================

/// Returns `feature_disabled` unless `enabled` is true.
///
/// # Errors
///
/// Returns [`ApiError`] with [`ErrorKind::FeatureDisabled`] when `enabled`
/// is false.
pub fn require_feature(enabled: bool, name: &str) -> Result<(), ApiError> {
    if enabled {
        Ok(())
    } else {
        Err(ApiError::new(ErrorKind::FeatureDisabled, format!("{name} is disabled")))
    }
}

#[cfg(test)]
mod tests {
    use jobforge_core::error::ErrorKind;
    use jobforge_core::ids::JobId;

    use super::parse_job_id;
    use super::require_feature;

    #[test]
    fn parses_a_well_formed_job_id() {
        let id = JobId::generate();
        let parsed = parse_job_id(&id.to_string()).expect("parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_a_malformed_job_id() {
        let err = parse_job_id("not-a-uuid").expect_err("should reject");
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn disabled_feature_is_reported() {
        let err = require_feature(false, "events").expect_err("should reject");
        assert_eq!(err.kind, ErrorKind::FeatureDisabled);
    }

    #[test]
    fn enabled_feature_passes() {
        require_feature(true, "events").expect("should pass");
    }
}
