use std::future::Future;
use std::net::SocketAddr;

use mockapi_core::{MockServerConfig, SharedStorage};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bootstrap::{attach_http_layers, build_state, socket_addr, BootstrapError};
use crate::{build_router, AppState};

/// Embeddable mock server: profile state plus the HTTP stack around it.
#[derive(Debug)]
pub struct MockApiServer {
    config: MockServerConfig,
    state: AppState,
}

impl MockApiServer {
    pub async fn new(config: MockServerConfig, storage: SharedStorage) -> Result<Self, BootstrapError> {
        let state = build_state(&config, storage).await?;
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &MockServerConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Router with tracing, access-log and concurrency layers attached.
    pub fn router(&self) -> axum::Router {
        attach_http_layers(build_router(self.state.clone()), &self.config, &self.state)
    }

    async fn bind(&self) -> Result<TcpListener, BootstrapError> {
        let addr = socket_addr(&self.config)?;
        TcpListener::bind(addr)
            .await
            .map_err(|source| BootstrapError::Bind { addr, source })
    }

    /// Serve on the configured address until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), BootstrapError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        let local = listener.local_addr().map_err(BootstrapError::Serve)?;
        info!(addr = %local, "mock api server listening");
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(BootstrapError::Serve)
    }

    /// Bind (port 0 picks a free port) and serve in a background task.
    pub async fn start(self) -> Result<RunningServer, BootstrapError> {
        let listener = self.bind().await?;
        let local_addr = listener.local_addr().map_err(BootstrapError::Serve)?;
        let app = self.router();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
            if let Err(err) = &result {
                error!("http server exited with error: {err}");
            }
            result
        });
        info!(addr = %local_addr, "mock api server started");
        Ok(RunningServer {
            local_addr,
            shutdown: Some(tx),
            handle,
        })
    }
}

/// Handle to a server started with [`MockApiServer::start`]. Dropping it
/// also triggers a graceful shutdown.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(mut self) -> Result<(), BootstrapError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match (&mut self.handle).await {
            Ok(result) => result.map_err(BootstrapError::Serve),
            Err(join) => Err(BootstrapError::Serve(std::io::Error::other(join))),
        }?;
        info!(addr = %self.local_addr, "mock api server stopped");
        Ok(())
    }
}
