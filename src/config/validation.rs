//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, quotas > 0)
//! - Check that addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, QuotaConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("backend.base_url '{0}' is not an http(s) URL")]
    InvalidBackendUrl(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("backend.default_model must not be empty")]
    EmptyDefaultModel,

    #[error("auth.api_key must not be empty when set")]
    EmptyApiKey,

    #[error("auth.header '{0}' is not a valid header name")]
    InvalidAuthHeader(String),
}

/// Validate a loaded configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("listener.request_timeout_secs"));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("listener.max_body_bytes"));
    }

    match Url::parse(&config.backend.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::InvalidBackendUrl(
            config.backend.base_url.clone(),
        )),
    }
    if config.backend.default_model.trim().is_empty() {
        errors.push(ValidationError::EmptyDefaultModel);
    }
    if config.backend.timeout_ms == 0 {
        errors.push(ValidationError::Zero("backend.timeout_ms"));
    }
    if config.backend.connect_timeout_ms == 0 {
        errors.push(ValidationError::Zero("backend.connect_timeout_ms"));
    }

    check_quota(
        &config.rate_limit.default,
        "rate_limit.default.max_requests",
        "rate_limit.default.window_secs",
        &mut errors,
    );
    check_quota(
        &config.rate_limit.generate,
        "rate_limit.generate.max_requests",
        "rate_limit.generate.window_secs",
        &mut errors,
    );

    if let Some(key) = &config.auth.api_key {
        if key.is_empty() {
            errors.push(ValidationError::EmptyApiKey);
        }
    }
    if axum::http::HeaderName::from_bytes(config.auth.header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidAuthHeader(config.auth.header.clone()));
    }

    if config.validation.max_prompt_chars == 0 {
        errors.push(ValidationError::Zero("validation.max_prompt_chars"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Join validation errors into one line.
pub(crate) fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_quota(
    quota: &QuotaConfig,
    max_field: &'static str,
    window_field: &'static str,
    errors: &mut Vec<ValidationError>,
) {
    if !quota.enabled {
        return;
    }
    if quota.max_requests == 0 {
        errors.push(ValidationError::Zero(max_field));
    }
    if quota.window_secs == 0 {
        errors.push(ValidationError::Zero(window_field));
    }
}
