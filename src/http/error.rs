//! Client-facing error taxonomy.
//!
//! Every rejection leaves the gateway as `{"error": "<message>"}` with a
//! stable message. Internal detail stays in the server log.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::backend::{BackendError, BackendOperation};
use crate::prompt::InvalidPrompt;

pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or unreadable required fields.
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),

    #[error("invalid API key")]
    Unauthorized,

    #[error("request body exceeds the configured limit")]
    PayloadTooLarge,

    #[error("request timed out")]
    Timeout,

    #[error("rate limit exceeded, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("invalid prompt: {0}")]
    InvalidPrompt(#[from] InvalidPrompt),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MalformedRequest(_) | GatewayError::InvalidPrompt(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Timeout => StatusCode::REQUEST_TIMEOUT,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::BackendUnavailable(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::MalformedRequest(message) => *message,
            GatewayError::Unauthorized => "Invalid API key",
            GatewayError::PayloadTooLarge => "Request body too large",
            GatewayError::Timeout => "Request timed out. Please try again.",
            GatewayError::RateLimited { .. } => "Rate limit exceeded",
            GatewayError::InvalidPrompt(reason) => reason.public_message(),
            GatewayError::BackendUnavailable(e) => match e.operation() {
                BackendOperation::Generate => "Failed to generate response. Please try again.",
                BackendOperation::ListModels => "Failed to list models. Please try again.",
            },
            GatewayError::Internal(_) => INTERNAL_ERROR_MESSAGE,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.public_message().to_string(),
        });
        let mut response = (self.status(), body).into_response();

        if let GatewayError::RateLimited { retry_after } = &self {
            // Round up so clients never retry before the window restarts.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}

/// Give error responses built outside the handlers (tower layers, axum's
/// method router) the same `{"error": ...}` body as everything else.
pub async fn json_error_bodies(response: Response) -> Response {
    let status = response.status();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json || !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    match status {
        StatusCode::REQUEST_TIMEOUT => GatewayError::Timeout.into_response(),
        StatusCode::PAYLOAD_TOO_LARGE => GatewayError::PayloadTooLarge.into_response(),
        StatusCode::INTERNAL_SERVER_ERROR => GatewayError::Internal(String::new()).into_response(),
        _ => {
            let (mut parts, _) = response.into_parts();
            let error = status.canonical_reason().unwrap_or("Request failed").to_string();
            let body = Json(ErrorBody { error }).into_response();
            parts.headers.remove(header::CONTENT_LENGTH);
            parts.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            Response::from_parts(parts, body.into_body())
        }
    }
}
