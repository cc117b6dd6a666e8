//! Inference backend HTTP client with timeout and error handling.
//!
//! # Responsibilities
//! - Forward generation requests to `POST {base_url}/api/generate`
//! - Fetch the model listing from `GET {base_url}/api/tags`
//! - Normalize transport errors, timeouts and non-2xx answers into `BackendError`
//! - Apply the optional fallback policy

use reqwest::StatusCode;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use url::Url;

use crate::backend::types::{GenerateBody, GenerationRequest, GenerationResult, ModelDescriptor, ModelList};
use crate::config::BackendConfig;
use crate::observability::metrics;

/// Calls the gateway makes to the inference backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOperation {
    Generate,
    ListModels,
}

impl BackendOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendOperation::Generate => "generate",
            BackendOperation::ListModels => "list_models",
        }
    }
}

impl fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The inference backend could not serve a call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{op} call to inference backend timed out")]
    Timeout { op: BackendOperation },

    #[error("{op} call to inference backend failed: {source}")]
    Transport {
        op: BackendOperation,
        #[source]
        source: reqwest::Error,
    },

    #[error("inference backend answered {op} with status {status}")]
    Status {
        op: BackendOperation,
        status: StatusCode,
    },

    #[error("inference backend sent an unreadable {op} response: {reason}")]
    Decode { op: BackendOperation, reason: String },
}

impl BackendError {
    pub fn operation(&self) -> BackendOperation {
        match self {
            BackendError::Timeout { op }
            | BackendError::Transport { op, .. }
            | BackendError::Status { op, .. }
            | BackendError::Decode { op, .. } => *op,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Timeout { .. } => "timeout",
            BackendError::Transport { .. } => "transport",
            BackendError::Status { .. } => "status",
            BackendError::Decode { .. } => "decode",
        }
    }

    fn from_reqwest(op: BackendOperation, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            BackendError::Timeout { op }
        } else {
            BackendError::Transport { op, source }
        }
    }
}

/// Error building a `BackendClient`.
#[derive(Debug, Error)]
pub enum ClientInitError {
    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP client for the inference backend.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    generate_url: Url,
    tags_url: Url,
    fallback_enabled: bool,
}

impl BackendClient {
    /// Create a client from the backend configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, ClientInitError> {
        let mut base = Url::parse(&config.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout());
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self {
            http: builder.build()?,
            generate_url: base.join("api/generate")?,
            tags_url: base.join("api/tags")?,
            fallback_enabled: config.fallback_enabled,
        })
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback_enabled
    }

    /// Send one generation request to the backend.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, BackendError> {
        let op = BackendOperation::Generate;
        let start = Instant::now();

        let result = async {
            let raw: serde_json::Value = self
                .send(
                    op,
                    self.http.post(self.generate_url.clone()).json(&GenerateBody {
                        model: &request.model,
                        prompt: &request.prompt,
                        stream: false,
                    }),
                )
                .await?;

            GenerationResult::from_backend(raw).map_err(|e| BackendError::Decode {
                op,
                reason: e.to_string(),
            })
        }
        .await;

        metrics::record_backend_call(op.as_str(), outcome(&result), start);
        result
    }

    /// Like [`generate`](Self::generate), but answers with the canned
    /// fallback output instead of failing when fallback mode is enabled.
    pub async fn generate_or_fallback(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, BackendError> {
        match self.generate(request).await {
            Err(e) if self.fallback_enabled => {
                tracing::warn!(
                    error = %e,
                    kind = e.kind(),
                    model = %request.model,
                    "Inference backend unavailable, answering with fallback output"
                );
                metrics::record_fallback();
                Ok(GenerationResult::fallback())
            }
            other => other,
        }
    }

    /// Fetch the backend's model listing.
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BackendError> {
        let op = BackendOperation::ListModels;
        let start = Instant::now();

        let result = self
            .send::<ModelList>(op, self.http.get(self.tags_url.clone()))
            .await
            .map(|list| list.models);

        metrics::record_backend_call(op.as_str(), outcome(&result), start);
        result
    }

    async fn send<T>(&self, op: BackendOperation, request: reqwest::RequestBuilder) -> Result<T, BackendError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(op, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status { op, status });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout { op }
            } else {
                BackendError::Decode {
                    op,
                    reason: e.to_string(),
                }
            }
        })
    }
}

fn outcome<T>(result: &Result<T, BackendError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    }
}
