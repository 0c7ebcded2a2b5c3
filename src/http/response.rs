//! Fixed client-facing responses.
//!
//! # Design Decisions
//! - Plain-text bodies ending in a newline
//! - Missing host and unknown host are client outcomes, not faults
//! - Backend failures map to 502, saturation to 503

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub const MISSING_HOST: &str = "Missing Host header\n";
pub const NOT_FOUND: &str = "Page not found\n";
pub const NO_BACKEND: &str = "No available backend\n";
pub const BAD_GATEWAY: &str = "Upstream request failed\n";

/// 400 for a request that names no host.
pub fn missing_host() -> Response {
    (StatusCode::BAD_REQUEST, MISSING_HOST).into_response()
}

/// 404 for a host no rule matches.
pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND).into_response()
}

/// 503 when every backend in the group is saturated.
pub fn no_backend() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, NO_BACKEND).into_response()
}

/// 502 when forwarding to the backend failed.
pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, BAD_GATEWAY).into_response()
}
