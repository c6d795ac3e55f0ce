//! hf-server: HTTP serving of the HLS output tree.
//!
//! Serves `master.m3u8`, the per-rendition playlists and their segments
//! straight from the output root, plus a small JSON API for status and
//! explicit counter re-seeding. Playlists are replaced atomically by the
//! writers, so a request never observes a half-written file.

pub mod context;
pub mod error;
pub mod router;
pub mod routes;

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

pub use context::AppContext;
pub use router::build_router;

/// Serve until Ctrl+C, SIGTERM, or `cancel` fires.
///
/// Cancels `cancel` on the way out so sibling tasks (live ingestion) stop
/// with the server.
pub async fn serve(ctx: AppContext, cancel: CancellationToken) -> hf_core::Result<()> {
    let server = &ctx.config.server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e| hf_core::Error::Validation(format!("Invalid server address: {e}")))?;

    let root = ctx.config.output.root.clone();
    if !root.exists() {
        tracing::warn!("Output root {} does not exist yet", root.display());
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| hf_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Serving {} on http://{addr}/master.m3u8", root.display());

    let app = build_router(ctx);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    cancel.cancel();
    result.map_err(|e| hf_core::Error::Internal(format!("server error: {e}")))?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, SIGTERM, or cancellation of `cancel`.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hf_av::ToolRegistry;
    use hf_core::config::Config;

    #[tokio::test]
    async fn serve_stops_on_cancel() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.host = "127.0.0.1".into();
        config.server.port = 0;
        config.output.root = tmp.path().to_path_buf();
        let ctx = AppContext::standalone(config, Arc::new(ToolRegistry::default()));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(serve(ctx, cancel.clone()));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn bad_host_is_rejected() {
        let mut config = Config::default();
        config.server.host = "not a host".into();
        let ctx = AppContext::standalone(config, Arc::new(ToolRegistry::default()));
        let err = serve(ctx, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, hf_core::Error::Validation(_)));
    }
}
