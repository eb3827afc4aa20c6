// jobforge-server/src/error.rs
// ============================================================================
// Module: Error Response Mapping
// Description: Renders ApiError as a JSON body with a trace-id-stamped
//              status code.
// Purpose: Give every handler one place to turn a Result<T, ApiError> into
//          an HTTP response, always carrying x-trace-id and never leaking
//          unredacted detail.
// Dependencies: axum, jobforge-core (error, ids), serde_json
// ============================================================================

//! ## Overview
//! Every error response includes the trace id for correlation; `debug` is
//! only ever attached by callers that already redacted it (see
//! `jobforge_core::redact::Redactor`), never computed here. [`respond`] is
//! the sole place a handler's `Result` becomes an HTTP response, so the
//! trace header and status mapping can never drift between endpoints.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use jobforge_core::error::ApiError;
use jobforge_core::error::ErrorKind;
use jobforge_core::ids::TraceId;
use serde::Serialize;

use crate::trace;

// ============================================================================
// SECTION: Status Mapping
// ============================================================================

/// Maps a stable error kind to the HTTP status code the worker protocol
/// API returns for it.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound | ErrorKind::TemplateNotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::NotOwner | ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::FeatureDisabled | ErrorKind::TemplateDisabled | ErrorKind::PolicyDenied => StatusCode::FORBIDDEN,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// SECTION: Response Assembly
// ============================================================================

/// Renders `result` as a JSON response, stamping `trace_id` on success and
/// error alike.
#[must_use]
pub fn respond<T: Serialize>(trace_id: &TraceId, result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => with_trace_header(trace_id, (StatusCode::OK, Json(body)).into_response()),
        Err(error) => error_response(trace_id, error),
    }
}

/// Renders `result` as a JSON response with a caller-chosen success status.
#[must_use]
pub fn respond_with_status<T: Serialize>(trace_id: &TraceId, status: StatusCode, result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => with_trace_header(trace_id, (status, Json(body)).into_response()),
        Err(error) => error_response(trace_id, error),
    }
}

/// Renders an [`ApiError`] as its JSON envelope, stamped with `trace_id`.
#[must_use]
pub fn error_response(trace_id: &TraceId, error: ApiError) -> Response {
    let error = error.with_trace_id(trace_id.clone());
    let status = status_for(error.kind);
    with_trace_header(trace_id, (status, Json(error)).into_response())
}

/// Attaches the `x-trace-id` response header.
fn with_trace_header(trace_id: &TraceId, mut response: Response) -> Response {
    response.headers_mut().insert(trace::TRACE_HEADER, trace::header_value(trace_id));
    response
}
