//! Inference backend request/response types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Output returned when the backend fails and fallback mode is on.
pub const FALLBACK_OUTPUT: &str = "Sorry, the model is currently unavailable. Please try again later.";

/// A validated and sanitized generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    /// Model name as understood by the backend.
    pub model: String,
    /// Prompt text.
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

/// Wire body for `POST /api/generate`.
#[derive(Debug, Serialize)]
pub(crate) struct GenerateBody<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    /// Ask for a single JSON document instead of a stream.
    pub stream: bool,
}

/// Result of a generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// Generated text.
    pub output: String,
    /// The backend document this result was read from. `None` for fallbacks.
    pub raw: Option<Value>,
}

impl GenerationResult {
    /// Read the generated text from a backend document (`response` or `output`).
    pub fn from_backend(raw: Value) -> Result<Self, MissingOutput> {
        let output = ["response", "output"]
            .iter()
            .find_map(|field| raw.get(field).and_then(Value::as_str))
            .ok_or(MissingOutput)?
            .to_string();

        Ok(Self {
            output,
            raw: Some(raw),
        })
    }

    /// The canned answer used in fallback mode.
    pub fn fallback() -> Self {
        Self {
            output: FALLBACK_OUTPUT.to_string(),
            raw: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.raw.is_none()
    }
}

/// The backend document carried no generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("backend response has no 'response' or 'output' field")]
pub struct MissingOutput;

/// One entry of the backend's model listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,

    /// Fields this gateway does not interpret, passed through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `GET /api/tags` and of the gateway's models endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_from_ollama_document() {
        let raw = json!({"model": "llama2", "response": "Hi there", "done": true});
        let result = GenerationResult::from_backend(raw.clone()).unwrap();
        assert_eq!(result.output, "Hi there");
        assert_eq!(result.raw, Some(raw));
        assert!(!result.is_fallback());
    }

    #[test]
    fn test_result_accepts_output_field() {
        let result = GenerationResult::from_backend(json!({"output": "done"})).unwrap();
        assert_eq!(result.output, "done");
    }

    #[test]
    fn test_result_without_text_is_rejected() {
        assert_eq!(
            GenerationResult::from_backend(json!({"error": "model not found"})),
            Err(MissingOutput)
        );
    }

    #[test]
    fn test_model_descriptor_keeps_unknown_fields() {
        let list: ModelList = serde_json::from_value(json!({
            "models": [{
                "name": "llama2:latest",
                "size": 3825819519u64,
                "digest": "fe938a131f40",
                "details": {"family": "llama"}
            }]
        }))
        .unwrap();

        let model = &list.models[0];
        assert_eq!(model.name, "llama2:latest");
        assert_eq!(model.size, Some(3825819519));
        assert_eq!(model.extra["details"]["family"], "llama");

        let back = serde_json::to_value(&list).unwrap();
        assert_eq!(back["models"][0]["details"]["family"], "llama");
        assert!(back["models"][0].get("modified_at").is_none());
    }
}
