//! outbox-dispatcher
//!
//! Drains the transactional outbox onto the FIFO queue at-least-once, and
//! sweeps expired processing locks and idempotency keys on the side
//! (§4.10). Horizontally scalable; replicas race harmlessly (DESIGN.md
//! open question 3).

use std::sync::Arc;
use std::time::Duration;

use authorization_core::dispatcher::{DispatcherConfig, OutboxDispatcher};
use authorization_core::idempotency::IdempotencyRepository;
use authorization_core::locking::DistributedLock;
use authorization_core::outbox::OutboxRepository;
use authorization_core::queue::FifoQueue;
use authorization_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authorization_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("starting outbox-dispatcher");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    if !authorization_core::db::check_schema(&pool).await? {
        tracing::error!("database schema is not complete, run migrations first");
        return Err(anyhow::anyhow!("database schema incomplete"));
    }

    // NOTE: a FIFO queue shared in-process only demonstrates the contract;
    // production deployments point this at the real queueing service
    // (§1, out of scope) via a different `Queue` implementation.
    let queue = Arc::new(FifoQueue::new(Duration::from_secs(
        config.visibility_timeout_seconds as u64,
    )));

    let dispatcher = OutboxDispatcher::new(
        OutboxRepository::new(pool.clone()),
        queue,
        DistributedLock::new(pool.clone()),
        IdempotencyRepository::new(pool.clone()),
        DispatcherConfig {
            outbox_batch_size: config.outbox_batch_size,
            outbox_poll_interval: Duration::from_millis(config.outbox_poll_interval_ms),
            ..DispatcherConfig::default()
        },
    );

    let handle = dispatcher.start();

    shutdown_signal().await;
    tracing::info!("outbox-dispatcher shutting down after current iteration...");
    handle.abort();
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
