//! Inference backend subsystem.
//!
//! # Data Flow
//! ```text
//! GenerationRequest (validated, sanitized)
//!     → client.rs (POST /api/generate, bounded timeout)
//!     → types.rs (GenerationResult from backend JSON)
//!     → on failure: BackendError, or the fallback output if enabled
//! ```
//!
//! # Design Decisions
//! - Backend schema is opaque beyond the generate and tags calls
//! - Single attempt per request: no retry, backoff or circuit breaker
//! - Dropping the request future aborts the outbound call

pub mod client;
pub mod types;

pub use client::{BackendClient, BackendError, BackendOperation, ClientInitError};
pub use types::{GenerationRequest, GenerationResult, ModelDescriptor, ModelList, FALLBACK_OUTPUT};
