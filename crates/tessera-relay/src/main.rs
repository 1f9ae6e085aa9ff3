//! Tessera relay — entry point.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tessera_core::clock::SystemClock;
use tessera_outbox::{LoggingPublisher, OutboxEvent, OutboxRelay};
use tessera_postgres::PgRepository;
use tessera_relay::config::RelaySettings;
use tessera_relay::error::AppError;
use tessera_relay::tasks::run_cleanup;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // A missing .env file is fine; variables may come from the process.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let settings = RelaySettings::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let relay = Arc::new(OutboxRelay::new(
        PgRepository::<OutboxEvent>::new(pool.clone()),
        LoggingPublisher,
        Arc::new(SystemClock),
        settings.relay_config(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = tokio::spawn(run_cleanup(
        Arc::clone(&relay),
        settings.cleanup_interval,
        shutdown_rx.clone(),
    ));
    let relay_loop = tokio::spawn({
        let relay = Arc::clone(&relay);
        async move { relay.run(shutdown_rx).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    relay_loop.await.map_err(std::io::Error::other)?;
    cleanup.await.map_err(std::io::Error::other)?;
    pool.close().await;
    info!("relay stopped");
    Ok(())
}
