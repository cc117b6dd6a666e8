//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (GATEWAY_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_with, ConfigError};
pub use schema::{
    AuthConfig, BackendConfig, GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    QuotaConfig, RateLimitConfig, ResponseMode, ValidationConfig,
};
