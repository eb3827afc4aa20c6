// jobforge-core/src/error.rs
// ============================================================================
// Module: JobForge Error Taxonomy
// Description: Stable wire-level error kinds and the API error envelope.
// Purpose: Give every JobForge crate (store, connectors, server, cli) a
//          single exhaustive vocabulary for reporting failures.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`ErrorKind`] is the closed set of error categories a caller can observe
//! across the worker protocol, the policy gate, and the CLI. Crate-specific
//! error enums (store errors, connector errors) convert into [`ApiError`] at
//! their public boundary rather than leaking implementation detail upward.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::ids::TraceId;

// ============================================================================
// SECTION: Error Kind
// ============================================================================

/// Closed set of error categories surfaced across the execution plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller input failed schema or domain validation.
    #[error("validation")]
    Validation,
    /// The referenced resource does not exist in this tenant's scope.
    #[error("not_found")]
    NotFound,
    /// The request conflicts with existing state (e.g. duplicate idempotency key).
    #[error("conflict")]
    Conflict,
    /// The caller does not hold the lease/claim it is operating on.
    #[error("not_owner")]
    NotOwner,
    /// The requested transition is not valid from the resource's current state.
    #[error("invalid_state")]
    InvalidState,
    /// A required feature flag is disabled for this tenant.
    #[error("feature_disabled")]
    FeatureDisabled,
    /// The referenced template key/version does not exist.
    #[error("template_not_found")]
    TemplateNotFound,
    /// The referenced template exists but is disabled.
    #[error("template_disabled")]
    TemplateDisabled,
    /// The policy gate denied the requested action.
    #[error("policy_denied")]
    PolicyDenied,
    /// The caller exceeded an enforced rate limit.
    #[error("rate_limited")]
    RateLimited,
    /// The operation did not complete within its allotted time.
    #[error("timeout")]
    Timeout,
    /// An unexpected internal failure occurred.
    #[error("internal")]
    Internal,
}

impl ErrorKind {
    /// Returns whether a caller may reasonably retry an operation that
    /// failed with this kind, ignoring any operation-specific idempotency
    /// concerns.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::Internal)
    }
}

// ============================================================================
// SECTION: API Error Envelope
// ============================================================================

/// Stable error envelope returned across the worker protocol and CLI.
///
/// # Invariants
/// - `debug` must already be redacted before being attached; see
///   `crate::redact::Redactor`.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// Stable error category.
    pub kind: ErrorKind,
    /// Human-readable message safe to display to an operator.
    pub message: String,
    /// Whether retrying the same request may succeed.
    pub retryable: bool,
    /// Optional redacted debug detail, omitted from normal responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
    /// Trace id of the request that produced this error, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
}

impl ApiError {
    /// Builds an error of the given kind with a message, inferring
    /// retryability from the kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.is_retryable();
        Self {
            kind,
            message: message.into(),
            retryable,
            debug: None,
            trace_id: None,
        }
    }

    /// Attaches redacted debug detail.
    #[must_use]
    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }

    /// Attaches the trace id of the request that produced this error.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Shorthand for [`ErrorKind::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Shorthand for [`ErrorKind::NotFound`].
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for [`ErrorKind::Conflict`].
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Shorthand for [`ErrorKind::NotOwner`].
    #[must_use]
    pub fn not_owner(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotOwner, message)
    }

    /// Shorthand for [`ErrorKind::InvalidState`].
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    /// Shorthand for [`ErrorKind::PolicyDenied`].
    #[must_use]
    pub fn policy_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PolicyDenied, message)
    }

    /// Shorthand for [`ErrorKind::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use super::ErrorKind;

    #[test]
    fn retryable_kinds_default_retryable_flag() {
        let error = ApiError::new(ErrorKind::Timeout, "deadline exceeded");
        assert!(error.retryable);
    }

    #[test]
    fn non_retryable_kinds_default_non_retryable_flag() {
        let error = ApiError::validation("missing field");
        assert!(!error.retryable);
    }

    #[test]
    fn serializes_kind_as_snake_case() {
        let json = serde_json::to_string(&ErrorKind::TemplateNotFound).expect("serialize");
        assert_eq!(json, "\"template_not_found\"");
    }

    #[test]
    fn debug_field_omitted_when_absent() {
        let error = ApiError::internal("boom");
        let json = serde_json::to_string(&error).expect("serialize");
        assert!(!json.contains("debug"));
    }
}
