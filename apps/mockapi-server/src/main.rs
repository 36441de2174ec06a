use std::sync::Arc;

use anyhow::Context;
use mockapi_core::{FsStorage, SharedStorage};
use mockapi_server::{load_server_config, MockApiServer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = load_server_config().context("loading configuration")?;
    mockapi_otel::init(loaded.config.log_level, &loaded.config.access_log);
    match &loaded.source {
        Some(path) => info!(config = %path.display(), "configuration loaded"),
        None => info!("no configuration file; using defaults"),
    }

    let storage: SharedStorage = Arc::new(FsStorage::new());
    let server = MockApiServer::new(loaded.config, storage)
        .await
        .context("building profile registry")?;
    server.serve_with_shutdown(shutdown_signal()).await?;
    info!("mock api server stopped");
    Ok(())
}

async fn shutdown_signal() {
    info!("shutdown signal listener active");
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!("failed to install SIGTERM handler: {err}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
