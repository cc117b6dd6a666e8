//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGINT, SIGTERM and the internal shutdown broadcast all trigger graceful shutdown

use tokio::sync::broadcast;

/// Resolve when the process should stop serving.
pub async fn shutdown_signal(mut shutdown: broadcast::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let source = tokio::select! {
        _ = ctrl_c => "ctrl_c",
        _ = terminate => "sigterm",
        _ = shutdown.recv() => "broadcast",
    };

    tracing::info!(source, "Shutdown signal received");
}
