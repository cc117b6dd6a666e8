//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, QuotaConfig, QuotaParseError};
use crate::config::validation::{describe, validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable {var}: {source}")]
    Env {
        var: &'static str,
        source: QuotaParseError,
    },

    #[error("Validation failed: {}", describe(.0))]
    Validation(Vec<ValidationError>),
}

pub const ENV_BIND_ADDRESS: &str = "GATEWAY_BIND_ADDRESS";
pub const ENV_BACKEND_URL: &str = "GATEWAY_BACKEND_URL";
pub const ENV_API_KEY: &str = "GATEWAY_API_KEY";
pub const ENV_RATE_LIMIT: &str = "GATEWAY_RATE_LIMIT";
pub const ENV_DEFAULT_RATE_LIMIT: &str = "GATEWAY_DEFAULT_RATE_LIMIT";
pub const ENV_FALLBACK: &str = "GATEWAY_FALLBACK";
pub const ENV_DEBUG: &str = "GATEWAY_DEBUG";

/// Build the startup configuration: optional TOML file, then process
/// environment overrides, then validation.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_with(path, |name| std::env::var(name).ok())
}

/// Like [`load`], with environment values read through `lookup`.
pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match path {
        Some(path) => read_file(path)?,
        None => GatewayConfig::default(),
    };

    let config = apply_env_overrides(config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn read_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment values onto `config`. `lookup` returns the value of
/// a variable, if set.
pub fn apply_env_overrides<F>(mut config: GatewayConfig, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup(ENV_BIND_ADDRESS) {
        config.listener.bind_address = addr;
    }
    if let Some(url) = lookup(ENV_BACKEND_URL) {
        config.backend.base_url = url;
    }
    if let Some(key) = lookup(ENV_API_KEY) {
        config.auth.api_key = Some(key);
    }
    if let Some(raw) = lookup(ENV_RATE_LIMIT) {
        config.rate_limit.generate = parse_quota(ENV_RATE_LIMIT, &raw)?;
    }
    if let Some(raw) = lookup(ENV_DEFAULT_RATE_LIMIT) {
        config.rate_limit.default = parse_quota(ENV_DEFAULT_RATE_LIMIT, &raw)?;
    }
    if let Some(flag) = lookup(ENV_FALLBACK) {
        config.backend.fallback_enabled = is_truthy(&flag);
    }
    if let Some(flag) = lookup(ENV_DEBUG) {
        config.observability.debug = is_truthy(&flag);
    }
    Ok(config)
}

fn parse_quota(var: &'static str, raw: &str) -> Result<QuotaConfig, ConfigError> {
    raw.parse()
        .map_err(|source| ConfigError::Env { var, source })
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "development"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = apply_env_overrides(
            GatewayConfig::default(),
            env(&[
                (ENV_BACKEND_URL, "http://gpu-box:11434"),
                (ENV_API_KEY, "s3cret"),
                (ENV_RATE_LIMIT, "5 per minute"),
                (ENV_FALLBACK, "true"),
                (ENV_DEBUG, "development"),
            ]),
        )
        .unwrap();

        assert_eq!(config.backend.base_url, "http://gpu-box:11434");
        assert_eq!(config.auth.api_key.as_deref(), Some("s3cret"));
        assert_eq!(config.rate_limit.generate, QuotaConfig::new(5, 60));
        assert_eq!(config.rate_limit.default, QuotaConfig::new(100, 60));
        assert!(config.backend.fallback_enabled);
        assert!(config.observability.debug);
    }

    #[test]
    fn test_bad_env_quota_is_reported() {
        let err = apply_env_overrides(
            GatewayConfig::default(),
            env(&[(ENV_DEFAULT_RATE_LIMIT, "lots")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_DEFAULT_RATE_LIMIT, .. }));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("gateway-{}.toml", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            "[auth]\napi_key = \"abc\"\n\n[validation]\nrequire_model = true\n",
        )
        .unwrap();

        let config = load_with(Some(&path), env(&[])).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.auth.api_key.as_deref(), Some("abc"));
        assert!(config.validation.require_model);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let path = std::env::temp_dir().join(format!("gateway-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[backend]\ntimeout_ms = 0\n").unwrap();

        let err = load_with(Some(&path), env(&[])).unwrap_err();
        fs::remove_file(&path).unwrap();

        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
    }

    #[test]
    fn test_env_overrides_file_before_validation() {
        let path = std::env::temp_dir().join(format!("gateway-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[backend]\nbase_url = \"nope\"\n").unwrap();

        let config = load_with(Some(&path), env(&[(ENV_BACKEND_URL, "http://gpu-box:11434")]));
        fs::remove_file(&path).unwrap();

        assert_eq!(config.unwrap().backend.base_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = load_with(None, env(&[])).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert_eq!(config.backend.default_model, "llama2");
        assert!(config.auth.api_key.is_none());
    }
}
