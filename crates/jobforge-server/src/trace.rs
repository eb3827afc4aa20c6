// jobforge-server/src/trace.rs
// ============================================================================
// Module: Trace Header Policy
// Description: Sanitization and generation for the x-trace-id header.
// Purpose: Accept a caller-supplied trace id on inbound HTTP, falling back
//          to a generated one, and echo it on every response.
// Dependencies: jobforge-core (ids), uuid
// ============================================================================

//! ## Overview
//! `x-trace-id` is accepted on inbound HTTP, propagated to internally
//! issued events and jobs, and echoed on responses. A caller-supplied
//! value is used as-is if it is non-empty after trimming; an absent or
//! blank header gets a freshly generated id so every request is still
//! traceable end to end.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::HeaderValue;
use jobforge_core::ids::TraceId;

/// Header name carrying the caller's trace id.
pub const TRACE_HEADER: &str = "x-trace-id";

/// Resolves the trace id for an inbound request: the caller's header value
/// if present and non-blank, otherwise a freshly generated id.
#[must_use]
pub fn resolve(headers: &HeaderMap) -> TraceId {
    headers
        .get(TRACE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| TraceId::new(uuid::Uuid::new_v4().to_string()), TraceId::new)
}

/// Builds the `x-trace-id` response header value for `trace_id`.
#[must_use]
pub fn header_value(trace_id: &TraceId) -> HeaderValue {
    HeaderValue::from_str(trace_id.as_str()).unwrap_or_else(|_| HeaderValue::from_static("invalid-trace-id"))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use axum::http::HeaderValue;

    use super::TRACE_HEADER;
    use super::resolve;

    #[test]
    fn uses_caller_supplied_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_HEADER, HeaderValue::from_static("caller-trace"));
        assert_eq!(resolve(&headers).as_str(), "caller-trace");
    }

    #[test]
    fn generates_a_trace_id_when_absent() {
        let headers = HeaderMap::new();
        assert!(!resolve(&headers).as_str().is_empty());
    }

    #[test]
    fn generates_a_trace_id_when_blank() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_HEADER, HeaderValue::from_static("   "));
        assert!(!resolve(&headers).as_str().is_empty());
    }
}
