//! Route handlers.
//!
//! The generate handler is the orchestrator: by the time it runs, the
//! middleware stack has already resolved the client key, applied the rate
//! limits and checked the API key. It then parses, validates, sanitizes,
//! calls the backend and shapes the response.

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::{GenerationRequest, GenerationResult, ModelList};
use crate::config::ResponseMode;
use crate::http::error::{ErrorBody, GatewayError};
use crate::http::request::request_id;
use crate::http::server::ServerContext;
use crate::observability::metrics;
use crate::prompt::{sanitize, validate_prompt, InvalidPrompt};
use crate::security::ClientKey;

pub const MISSING_MODEL_OR_PROMPT: &str = "Invalid request. Please provide both model and prompt.";
pub const MISSING_PROMPT: &str = "Invalid request. Please provide a prompt.";

/// Inbound generation body, as JSON or as a URL-encoded form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenerateForm {
    pub model: Option<String>,
    pub prompt: Option<String>,
}

/// Successful generation in `output` response mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub output: String,
}

/// Where a request came from, for log lines.
struct Origin {
    endpoint: String,
    client: ClientKey,
    request_id: String,
}

impl Origin {
    fn of(request: &Request) -> Self {
        Self {
            endpoint: request.uri().path().to_string(),
            client: request
                .extensions()
                .get::<ClientKey>()
                .cloned()
                .unwrap_or_else(ClientKey::unknown),
            request_id: request_id(request.headers()).to_string(),
        }
    }

    fn log_failure(&self, err: &GatewayError) {
        match err {
            GatewayError::BackendUnavailable(e) => tracing::error!(
                endpoint = %self.endpoint,
                client = %self.client,
                request_id = %self.request_id,
                kind = e.kind(),
                error = %e,
                "Inference backend call failed"
            ),
            GatewayError::InvalidPrompt(reason) => {
                metrics::record_prompt_rejected(reason.kind());
                // The prompt itself is never logged once rejected.
                tracing::warn!(
                    endpoint = %self.endpoint,
                    client = %self.client,
                    request_id = %self.request_id,
                    reason = reason.kind(),
                    "Rejected invalid prompt"
                )
            }
            GatewayError::Internal(detail) => tracing::error!(
                endpoint = %self.endpoint,
                client = %self.client,
                request_id = %self.request_id,
                detail = %detail,
                "Internal error"
            ),
            other => tracing::warn!(
                endpoint = %self.endpoint,
                client = %self.client,
                request_id = %self.request_id,
                error = %other,
                "Rejected request"
            ),
        }
    }
}

/// `POST /generate` and `POST /api/generate`.
pub async fn generate(State(ctx): State<ServerContext>, request: Request) -> Response {
    let origin = Origin::of(&request);

    match run_generate(&ctx, request).await {
        Ok(response) => response,
        Err(err) => {
            origin.log_failure(&err);
            err.into_response()
        }
    }
}

async fn run_generate(ctx: &ServerContext, request: Request) -> Result<Response, GatewayError> {
    let rules = &ctx.config.validation;
    let missing = if rules.require_model {
        MISSING_MODEL_OR_PROMPT
    } else {
        MISSING_PROMPT
    };

    let form = read_form(request, missing).await?;
    let prompt = form.prompt.ok_or(GatewayError::MalformedRequest(missing))?;
    let model = form.model.filter(|m| !m.trim().is_empty());
    if model.is_none() && rules.require_model {
        return Err(GatewayError::MalformedRequest(missing));
    }

    validate_prompt(&prompt, rules.max_prompt_chars)?;

    let model = model
        .map(|m| sanitize(m.trim()))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| ctx.config.backend.default_model.clone());
    let prompt = sanitize(&prompt);
    // Control characters pass the trim check but not the sanitizer.
    if prompt.trim().is_empty() {
        return Err(InvalidPrompt::Empty.into());
    }
    let request = GenerationRequest::new(model, prompt);

    tracing::debug!(
        model = %request.model,
        prompt_chars = request.prompt.chars().count(),
        "Forwarding prompt to inference backend"
    );

    let result = ctx.backend.generate_or_fallback(&request).await?;
    Ok(render(result, ctx.config.backend.response_mode))
}

async fn read_form(request: Request, missing: &'static str) -> Result<GenerateForm, GatewayError> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let parsed = if is_form {
        Form::<GenerateForm>::from_request(request, &())
            .await
            .map(|Form(form)| form)
            .map_err(|rejection| (rejection.status(), rejection.body_text()))
    } else {
        Json::<GenerateForm>::from_request(request, &())
            .await
            .map(|Json(form)| form)
            .map_err(|rejection| (rejection.status(), rejection.body_text()))
    };

    parsed.map_err(|(status, reason)| {
        tracing::debug!(%status, %reason, "Unreadable generate body");
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::PayloadTooLarge
        } else {
            GatewayError::MalformedRequest(missing)
        }
    })
}

fn render(result: GenerationResult, mode: ResponseMode) -> Response {
    match (mode, result.raw) {
        (ResponseMode::Raw, Some(raw)) => Json(raw).into_response(),
        (_, _) => Json(GenerateResponse {
            output: result.output,
        })
        .into_response(),
    }
}

/// `GET /api/models` and `GET /models`.
pub async fn list_models(State(ctx): State<ServerContext>, request: Request) -> Response {
    let origin = Origin::of(&request);

    match ctx.backend.list_models().await {
        Ok(models) => Json(ModelList { models }).into_response(),
        Err(e) => {
            let err = GatewayError::from(e);
            origin.log_failure(&err);
            err.into_response()
        }
    }
}

/// `GET /health`.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /`.
pub async fn index(State(ctx): State<ServerContext>) -> Html<String> {
    Html(format!(
        concat!(
            "<!doctype html>\n<html><head><title>prompt-gateway</title></head><body>\n",
            "<h1>prompt-gateway</h1>\n<ul>\n",
            "<li><code>POST /generate</code> &mdash; <code>{{\"model\": \"{model}\", \"prompt\": \"...\"}}</code></li>\n",
            "<li><code>POST /api/generate</code></li>\n",
            "<li><code>GET /api/models</code></li>\n",
            "<li><code>GET /health</code></li>\n",
            "</ul>\n</body></html>\n"
        ),
        model = sanitize(&ctx.config.backend.default_model),
    ))
}

/// Fallback for unknown routes.
pub async fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Not found".to_string(),
        }),
    )
}
