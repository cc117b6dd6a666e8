//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (peer address recorded by ConnectInfo)
//!     → server.rs (Axum setup, global layers)
//!     → request.rs (request ID)
//!     → security middleware (client key, rate limits, API key)
//!     → handlers.rs (parse → validate → sanitize → backend)
//!     → error.rs (failures as {"error": ...})
//!     → Send to client
//! ```

pub mod error;
pub mod handlers;
pub mod request;
pub mod server;

pub use error::{ErrorBody, GatewayError};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{GatewayServer, ServerContext, ServerInitError};
