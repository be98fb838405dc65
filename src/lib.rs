#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::Backends;
use crate::adapters::database::DbPool;
use crate::config::{Config, StorageConfig};
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::workers::UnreadRepairWorker;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Wires services and workers on top of already-initialized backends.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    backends: Option<Backends>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, backends: None }
    }

    #[must_use]
    pub fn with_backends(mut self, backends: Backends) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Builds the services and background workers.
    ///
    /// # Errors
    /// Returns an error if no backends were provided.
    pub fn build(self) -> anyhow::Result<App> {
        let backends = self.backends.ok_or_else(|| anyhow::anyhow!("Backends are required"))?;

        let message_service = MessageService::new(&backends, self.config.messaging.clone());
        let health_service = HealthService::new(&backends, self.config.health.clone());
        let workers = Workers {
            unread_repair: UnreadRepairWorker::new(message_service.clone(), self.config.repair.clone()),
        };

        Ok(App { message_service, health_service, workers })
    }
}

#[derive(Debug)]
pub struct App {
    pub message_service: MessageService,
    pub health_service: HealthService,
    pub workers: Workers,
}

#[derive(Debug)]
pub struct Workers {
    unread_repair: UnreadRepairWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.unread_repair.run(shutdown_rx))]
    }
}

/// Applies the embedded migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!().run(pool).await?;
    Ok(())
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }

        tracing::info!("Shutdown signal received, draining...");
        shutdown_tx.send_replace(true);
    });
}

/// Routes panics through tracing so they reach the structured log pipeline.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());

        tracing::error!(panic.location = %location, panic.payload = %payload, "Thread panicked");
    }));
}

/// Builds the S3 client from the storage configuration.
pub async fn initialize_s3_client(config: &StorageConfig) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        loader = loader.credentials_provider(Credentials::new(access_key, secret_key, None, None, "parley-static"));
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style).build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
