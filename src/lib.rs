//! Prompt Gateway Library

pub mod backend;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod prompt;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
