//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request limits).
    pub listener: ListenerConfig,

    /// Inference backend settings.
    pub backend: BackendConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Shared API key settings.
    pub auth: AuthConfig,

    /// Prompt validation rules.
    pub validation: ValidationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Total time allowed for handling one request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 60,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// How a successful generation is shaped for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// `{"output": "..."}`
    #[default]
    Output,
    /// The backend's JSON document, unchanged.
    Raw,
}

/// Inference backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the inference server (e.g., "http://localhost:11434").
    pub base_url: String,

    /// Model used when the caller does not name one.
    pub default_model: String,

    /// Timeout for a whole backend call in milliseconds.
    pub timeout_ms: u64,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Answer with a canned output instead of an error when the backend fails.
    pub fallback_enabled: bool,

    /// Response shape for successful generations.
    pub response_mode: ResponseMode,

    /// Route backend calls through the proxies named in the environment.
    pub use_system_proxy: bool,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "llama2".to_string(),
            timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            fallback_enabled: false,
            response_mode: ResponseMode::Output,
            use_system_proxy: false,
        }
    }
}

/// A request quota: at most `max_requests` per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Enable this limiter.
    pub enabled: bool,

    /// Requests allowed per window per client.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl QuotaConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            enabled: true,
            max_requests,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self::new(100, 60)
    }
}

/// Error returned when a quota string such as "10 per minute" cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid rate limit '{0}', expected e.g. \"10 per minute\"")]
pub struct QuotaParseError(pub String);

impl FromStr for QuotaConfig {
    type Err = QuotaParseError;

    /// Accepts `"<n> per <unit>"` or `"<n>/<unit>"` where unit is
    /// second, minute, hour or day (singular or plural).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || QuotaParseError(s.to_string());
        let normalized = s.trim().to_ascii_lowercase();

        let (count, unit) = match normalized.split_once('/') {
            Some((count, unit)) => (count.trim(), unit.trim()),
            None => {
                let mut parts = normalized.split_whitespace();
                let count = parts.next().ok_or_else(err)?;
                if parts.next() != Some("per") {
                    return Err(err());
                }
                let unit = parts.next().ok_or_else(err)?;
                if parts.next().is_some() {
                    return Err(err());
                }
                (count, unit)
            }
        };

        let max_requests: u32 = count.parse().map_err(|_| err())?;
        let window_secs = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 3600,
            "day" => 86_400,
            _ => return Err(err()),
        };

        Ok(Self::new(max_requests, window_secs))
    }
}

impl fmt::Display for QuotaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {}s", self.max_requests, self.window_secs)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Quota applied to every route except `/health`.
    pub default: QuotaConfig,

    /// Quota applied to the generate routes.
    pub generate: QuotaConfig,

    /// Honor `X-Forwarded-For` from trusted peers.
    pub trust_forwarded_for: bool,

    /// Peers allowed to set `X-Forwarded-For`. Empty means any peer.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default: QuotaConfig::new(100, 60),
            generate: QuotaConfig::new(10, 60),
            trust_forwarded_for: false,
            trusted_proxies: Vec::new(),
        }
    }
}

/// Shared API key configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret. When unset, no route requires a key.
    pub api_key: Option<String>,

    /// Header carrying the key.
    pub header: String,

    /// Also require the key on `/generate` and `/models`, not only `/api/*`.
    pub protect_web_routes: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            header: "X-API-Key".to_string(),
            protect_web_routes: false,
        }
    }
}

/// Prompt validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum prompt length in characters.
    pub max_prompt_chars: usize,

    /// Reject requests that do not name a model.
    pub require_model: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: crate::prompt::MAX_PROMPT_CHARS,
            require_model: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Debug mode: forces debug-level logging.
    pub debug: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            debug: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_parsing() {
        assert_eq!("10 per minute".parse(), Ok(QuotaConfig::new(10, 60)));
        assert_eq!("100 per Minute".parse(), Ok(QuotaConfig::new(100, 60)));
        assert_eq!("5/second".parse(), Ok(QuotaConfig::new(5, 1)));
        assert_eq!("2 per hours".parse(), Ok(QuotaConfig::new(2, 3600)));

        assert!("ten per minute".parse::<QuotaConfig>().is_err());
        assert!("10 per fortnight".parse::<QuotaConfig>().is_err());
        assert!("10 minute".parse::<QuotaConfig>().is_err());
        assert!("".parse::<QuotaConfig>().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [backend]
            base_url = "http://ollama:11434"
            response_mode = "raw"

            [rate_limit.generate]
            max_requests = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.base_url, "http://ollama:11434");
        assert_eq!(config.backend.default_model, "llama2");
        assert_eq!(config.backend.response_mode, ResponseMode::Raw);
        assert_eq!(config.rate_limit.generate.max_requests, 5);
        assert_eq!(config.rate_limit.generate.window_secs, 60);
        assert_eq!(config.validation.max_prompt_chars, 1000);
        assert!(config.auth.api_key.is_none());
    }
}
