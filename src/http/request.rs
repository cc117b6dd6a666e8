//! Request identification.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for requests that lack one
//! - Expose the ID to handlers and echo it on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A caller-supplied `x-request-id` is kept as is

use axum::http::{HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Read the request ID assigned to a request.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
