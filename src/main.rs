//! Prompt Gateway
//!
//! A thin HTTP gateway in front of an LLM inference backend, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────────┐
//!                    │                        PROMPT GATEWAY                         │
//!                    │                                                               │
//!   Client Request   │  ┌──────────┐   ┌────────────┐   ┌─────────┐   ┌──────────┐  │
//!   ─────────────────┼─▶│ security │──▶│  handlers  │──▶│ prompt  │──▶│ backend  │──┼──▶ Inference
//!                    │  │ key/rate │   │ parse body │   │validate │   │  client  │  │    Backend
//!                    │  │ /api key │   │            │   │sanitize │   │          │  │
//!                    │  └──────────┘   └────────────┘   └─────────┘   └────┬─────┘  │
//!                    │                                                      │        │
//!   Client Response  │  ┌────────────────────────────────────────────┐     │        │
//!   ◀────────────────┼──│ {"output": ...}  or  {"error": ...}        │◀────┘        │
//!                    │  └────────────────────────────────────────────┘              │
//!                    │                                                               │
//!                    │  Cross-cutting: config · observability · lifecycle            │
//!                    └──────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use prompt_gateway::observability::{logging, metrics};
use prompt_gateway::{config, GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "prompt-gateway")]
#[command(about = "HTTP gateway that validates and sanitizes prompts before inference", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = config::load(args.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!("prompt-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.base_url,
        default_model = %config.backend.default_model,
        generate_quota = %config.rate_limit.generate,
        default_quota = %config.rate_limit.default,
        api_key = config.auth.api_key.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
