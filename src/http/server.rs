//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the `ServerContext` shared by all handlers
//! - Create the Axum Router with handlers and per-route middleware
//! - Wire up global middleware (tracing, request ID, panics, timeout, body limit)
//! - Keep layer-produced errors in the `{"error": ...}` shape
//! - Serve on a listener until shutdown
//! - Run the rate limiter sweepers

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderName,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::backend::{BackendClient, ClientInitError};
use crate::config::validation::{describe, validate_config, ValidationError};
use crate::config::{GatewayConfig, QuotaConfig};
use crate::http::error::{json_error_bodies, GatewayError};
use crate::http::handlers;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::metrics;
use crate::security::{
    api_key_middleware, client_key_middleware, rate_limit::spawn_sweeper, rate_limit_middleware,
    ApiKeyState, ForwardedPolicy, RateLimitState, RateLimiter,
};

/// Error building the server.
#[derive(Debug, Error)]
pub enum ServerInitError {
    #[error("invalid configuration: {}", describe(.0))]
    Config(Vec<ValidationError>),

    #[error(transparent)]
    Backend(#[from] ClientInitError),
}

/// Everything a request needs, built once at startup and injected as state.
#[derive(Clone)]
pub struct ServerContext {
    pub config: Arc<GatewayConfig>,
    pub backend: BackendClient,
    pub default_limiter: Option<Arc<RateLimiter>>,
    pub generate_limiter: Option<Arc<RateLimiter>>,
    pub api_key: Option<ApiKeyState>,
    pub forwarded: Arc<ForwardedPolicy>,
}

impl ServerContext {
    pub fn new(config: GatewayConfig) -> Result<Self, ServerInitError> {
        validate_config(&config).map_err(ServerInitError::Config)?;

        let backend = BackendClient::new(&config.backend)?;

        let api_key = match &config.auth.api_key {
            Some(key) => {
                let header = HeaderName::from_bytes(config.auth.header.as_bytes()).map_err(|_| {
                    ServerInitError::Config(vec![ValidationError::InvalidAuthHeader(
                        config.auth.header.clone(),
                    )])
                })?;
                Some(ApiKeyState::new(key, header))
            }
            None => None,
        };

        Ok(Self {
            default_limiter: limiter_for(&config.rate_limit.default),
            generate_limiter: limiter_for(&config.rate_limit.generate),
            forwarded: Arc::new(ForwardedPolicy::from_config(&config.rate_limit)),
            api_key,
            backend,
            config: Arc::new(config),
        })
    }
}

fn limiter_for(quota: &QuotaConfig) -> Option<Arc<RateLimiter>> {
    quota
        .enabled
        .then(|| Arc::new(RateLimiter::from_quota(quota)))
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    context: ServerContext,
}

impl GatewayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerInitError> {
        let context = ServerContext::new(config)?;
        let router = Self::build_router(&context);
        Ok(Self { router, context })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Per request: client key → default limit → generate limit → API key → handler.
    #[allow(deprecated)]
    fn build_router(ctx: &ServerContext) -> Router {
        let config = &ctx.config;

        let mut web_generate = Router::new().route("/generate", post(handlers::generate));
        let mut web_models = Router::new().route("/models", get(handlers::list_models));
        if config.auth.protect_web_routes {
            web_generate = protect(ctx, web_generate);
            web_models = protect(ctx, web_models);
        }
        let api_generate = protect(ctx, Router::new().route("/api/generate", post(handlers::generate)));
        let api_models = protect(ctx, Router::new().route("/api/models", get(handlers::list_models)));

        let generate_routes = limit(
            ctx.generate_limiter.as_ref(),
            "generate",
            web_generate.merge(api_generate),
        );

        let app = Router::new()
            .route("/", get(handlers::index))
            .merge(web_models)
            .merge(api_models)
            .merge(generate_routes);

        limit(ctx.default_limiter.as_ref(), "default", app)
            .route("/health", get(handlers::health))
            .route_layer(middleware::from_fn(metrics::track_metrics))
            .fallback(handlers::not_found)
            .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
            .layer(middleware::from_fn_with_state(
                ctx.forwarded.clone(),
                client_key_middleware,
            ))
            .with_state(ctx.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                    .layer(CatchPanicLayer::custom(handle_panic))
                    .layer(middleware::map_response(json_error_bodies))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.listener.request_timeout_secs,
                    ))),
            )
    }

    /// Router with all layers, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    /// Run the server, accepting connections on the given listener until
    /// Ctrl+C, SIGTERM, or a message on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.context.config.backend.base_url,
            fallback = self.context.backend.fallback_enabled(),
            "HTTP server starting"
        );

        let sweepers: Vec<_> = [
            (self.context.default_limiter.clone(), "default"),
            (self.context.generate_limiter.clone(), "generate"),
        ]
        .into_iter()
        .filter_map(|(limiter, scope)| limiter.map(|l| spawn_sweeper(l, scope)))
        .collect();

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await;

        for sweeper in sweepers {
            sweeper.abort();
        }

        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn protect(ctx: &ServerContext, router: Router<ServerContext>) -> Router<ServerContext> {
    match &ctx.api_key {
        Some(state) => router.route_layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        )),
        None => router,
    }
}

fn limit(
    limiter: Option<&Arc<RateLimiter>>,
    scope: &'static str,
    router: Router<ServerContext>,
) -> Router<ServerContext> {
    match limiter {
        Some(limiter) => router.route_layer(middleware::from_fn_with_state(
            RateLimitState {
                limiter: limiter.clone(),
                scope,
            },
            rate_limit_middleware,
        )),
        None => router,
    }
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");

    tracing::error!(panic = %detail, "Request handler panicked");
    GatewayError::Internal(detail.to_string()).into_response()
}
