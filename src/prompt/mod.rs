//! Prompt checking subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request body
//!     → validator.rs (reject empty, oversized, markup characters)
//!     → sanitizer.rs (strip markup from model and prompt)
//!     → GenerationRequest handed to the backend client
//! ```
//!
//! Both stages are pure functions with no I/O.

pub mod sanitizer;
pub mod validator;

pub use sanitizer::sanitize;
pub use validator::{validate, validate_prompt, InvalidPrompt, FORBIDDEN_CHARS, MAX_PROMPT_CHARS};
