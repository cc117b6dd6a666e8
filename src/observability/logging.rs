//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level; debug mode forces `debug`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(config: &ObservabilityConfig) -> String {
    let level = if config.debug {
        "debug"
    } else {
        config.log_level.as_str()
    };
    format!("prompt_gateway={level},tower_http={level}")
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if let Err(e) = installed {
        eprintln!("tracing subscriber already installed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_overrides_level() {
        let mut config = ObservabilityConfig::default();
        assert_eq!(default_directives(&config), "prompt_gateway=info,tower_http=info");

        config.debug = true;
        assert_eq!(default_directives(&config), "prompt_gateway=debug,tower_http=debug");
    }
}
