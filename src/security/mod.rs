//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (resolve client key, X-Forwarded-For from trusted peers)
//!     → rate_limit.rs (default quota, then generate quota)
//!     → api_key.rs (shared key on protected routes)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Each check is a separate middleware that either short-circuits or passes through
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod api_key;
pub mod headers;
pub mod rate_limit;

pub use api_key::{api_key_middleware, ApiKeyState};
pub use headers::{client_key_middleware, ClientKey, ForwardedPolicy};
pub use rate_limit::{rate_limit_middleware, RateLimitState, RateLimiter};
