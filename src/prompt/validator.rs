//! Prompt validation.
//!
//! Checks run in order, cheapest first, before any network or logging I/O:
//! empty, too long, forbidden characters.

use thiserror::Error;

/// Default maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 1000;

/// Characters never accepted in a prompt.
pub const FORBIDDEN_CHARS: [char; 4] = ['<', '>', '{', '}'];

/// Why a prompt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidPrompt {
    #[error("prompt is empty")]
    Empty,

    #[error("prompt has {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("prompt contains forbidden character {0:?}")]
    ForbiddenCharacter(char),
}

impl InvalidPrompt {
    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            InvalidPrompt::Empty => "Prompt cannot be empty.",
            InvalidPrompt::TooLong { .. } | InvalidPrompt::ForbiddenCharacter(_) => "Invalid prompt",
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            InvalidPrompt::Empty => "empty",
            InvalidPrompt::TooLong { .. } => "too_long",
            InvalidPrompt::ForbiddenCharacter(_) => "forbidden_character",
        }
    }
}

/// Validate `prompt` against a maximum length of `max_chars` characters.
pub fn validate_prompt(prompt: &str, max_chars: usize) -> Result<(), InvalidPrompt> {
    if prompt.trim().is_empty() {
        return Err(InvalidPrompt::Empty);
    }

    let len = prompt.chars().count();
    if len > max_chars {
        return Err(InvalidPrompt::TooLong { len, max: max_chars });
    }

    match prompt.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        Some(c) => Err(InvalidPrompt::ForbiddenCharacter(c)),
        None => Ok(()),
    }
}

/// Returns true if `prompt` passes validation with the default length limit.
pub fn validate(prompt: &str) -> bool {
    validate_prompt(prompt, MAX_PROMPT_CHARS).is_ok()
}
