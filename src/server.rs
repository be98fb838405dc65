use crate::{AppBuilder, Workers};
use crate::adapters::Backends;
use crate::api::{MgmtState, app_router, mgmt_router};
use crate::config::Config;
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// The API and management routers bound to their sockets, with the workers not yet started.
#[derive(Debug)]
pub struct Server {
    api_listener: TcpListener,
    mgmt_listener: TcpListener,
    api: Router,
    mgmt: Router,
    workers: Workers,
    drain_timeout: Duration,
}

impl Server {
    /// Wires the services on `backends` and binds the configured API and management ports.
    ///
    /// # Errors
    /// Returns an error if the configured addresses are invalid or cannot be bound.
    pub async fn bind(config: &Config, backends: Backends) -> anyhow::Result<Self> {
        let app = AppBuilder::new(config.clone()).with_backends(backends).build()?;

        let api = app_router(config.clone(), app.message_service.clone());
        let mgmt =
            mgmt_router(MgmtState { health_service: app.health_service, message_service: app.message_service });

        let api_listener = listen(&config.server.host, config.server.port).await?;
        let mgmt_listener = listen(&config.server.host, config.server.mgmt_port).await?;
        tracing::info!(address = %api_listener.local_addr()?, "listening");
        tracing::info!(address = %mgmt_listener.local_addr()?, "management server listening");

        Ok(Self {
            api_listener,
            mgmt_listener,
            api,
            mgmt,
            workers: app.workers,
            drain_timeout: Duration::from_secs(config.server.shutdown_timeout_secs),
        })
    }

    /// # Errors
    /// Returns an error if the socket has been closed.
    pub fn api_addr(&self) -> std::io::Result<SocketAddr> {
        self.api_listener.local_addr()
    }

    /// # Errors
    /// Returns an error if the socket has been closed.
    pub fn mgmt_addr(&self) -> std::io::Result<SocketAddr> {
        self.mgmt_listener.local_addr()
    }

    /// Serves both routers and the workers until `shutdown` flips to true.
    ///
    /// A failing listener flips the flag for everyone else. Workers get the drain timeout to stop.
    pub async fn run(self, shutdown: watch::Sender<bool>) {
        let worker_tasks = self.workers.spawn_all(shutdown.subscribe());

        let served = tokio::try_join!(
            serve_until(self.api_listener, self.api, shutdown.subscribe()),
            serve_until(self.mgmt_listener, self.mgmt, shutdown.subscribe()),
        );
        if let Err(e) = served {
            tracing::error!(error = %e, "Server error");
        }

        shutdown.send_replace(true);
        tokio::select! {
            _ = futures::future::join_all(worker_tasks) => {
                tracing::info!("Background tasks finished.");
            }
            () = tokio::time::sleep(self.drain_timeout) => {
                tracing::warn!(timeout = ?self.drain_timeout, "Timeout waiting for background tasks to finish.");
            }
        }
    }
}

async fn listen(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    Ok(TcpListener::bind(addr).await?)
}

async fn serve_until(listener: TcpListener, router: Router, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|&stop| stop).await;
        })
        .await
}
