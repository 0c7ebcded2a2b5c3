//! Request inspection helpers.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4) for `x-request-id`
//! - Extract the routing host from a request
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The `Host` header wins over the URI authority; HTTP/2 requests carry
//!   the host only in the authority

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates a fresh UUID v4 for every request without an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(id))
    }
}

/// The host the request is addressed to, if it names one.
pub fn request_host<B>(request: &Request<B>) -> Option<&str> {
    let from_header = request
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty());

    from_header.or_else(|| request.uri().authority().map(|a| a.as_str()))
}

/// The request ID, or `"unknown"` when none was assigned.
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
