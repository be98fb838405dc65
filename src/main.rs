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

use futures::TryFutureExt;
use parley_server::adapters::Backends;
use parley_server::adapters::database::init_pool;
use parley_server::adapters::storage::S3Signer;
use parley_server::config::Config;
use parley_server::server::Server;
use parley_server::{initialize_s3_client, run_migrations, setup_panic_hook, spawn_signal_handler, telemetry};
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;
    setup_panic_hook();

    let (shutdown_tx, _) = watch::channel(false);
    spawn_signal_handler(shutdown_tx.clone());

    let server = connect_backends(&config)
        .and_then(|backends| Server::bind(&config, backends))
        .instrument(tracing::info_span!("boot_server"))
        .await?;
    server.run(shutdown_tx).await;

    telemetry_guard.shutdown();
    Ok(())
}

/// Postgres for conversations, messages and the collaborator directories; S3 for media links.
async fn connect_backends(config: &Config) -> anyhow::Result<Backends> {
    let pool = init_pool(&config.database).await?;
    run_migrations(&pool).await?;

    let s3_client = initialize_s3_client(&config.storage).await;
    let signer =
        S3Signer::new(s3_client, config.storage.bucket.clone(), Duration::from_secs(config.storage.presign_ttl_secs));

    Ok(Backends::postgres(pool, signer))
}
