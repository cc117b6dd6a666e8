//! Shared API key enforcement.

use axum::{
    extract::{Request, State},
    http::HeaderName,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::http::error::GatewayError;
use crate::security::headers::ClientKey;

/// The configured secret and the header it is expected in.
#[derive(Debug, Clone)]
pub struct ApiKeyState {
    pub key: Arc<str>,
    pub header: HeaderName,
}

impl ApiKeyState {
    pub fn new(key: &str, header: HeaderName) -> Self {
        Self {
            key: Arc::from(key),
            header,
        }
    }

    fn accepts(&self, provided: Option<&str>) -> bool {
        provided.is_some_and(|p| constant_time_eq(p.as_bytes(), self.key.as_bytes()))
    }
}

pub async fn api_key_middleware(
    State(state): State<ApiKeyState>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(&state.header)
        .and_then(|v| v.to_str().ok());

    if state.accepts(provided) {
        return next.run(request).await;
    }

    let client = request
        .extensions()
        .get::<ClientKey>()
        .cloned()
        .unwrap_or_else(ClientKey::unknown);
    tracing::warn!(
        client = %client,
        path = %request.uri().path(),
        header_present = provided.is_some(),
        "Rejected request with invalid API key"
    );
    GatewayError::Unauthorized.into_response()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_only_exact_key() {
        let state = ApiKeyState::new("s3cret", HeaderName::from_static("x-api-key"));
        assert!(state.accepts(Some("s3cret")));
        assert!(!state.accepts(Some("s3cre")));
        assert!(!state.accepts(Some("s3cret ")));
        assert!(!state.accepts(Some("")));
        assert!(!state.accepts(None));
    }
}
