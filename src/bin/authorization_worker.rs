//! authorization-worker
//!
//! FIFO queue consumer: for each message, acquires the distributed lock,
//! detects void races, calls tokenization and the payment processor, and
//! records the outcome atomically (§4.7, §4.8). Stateless; scale by
//! process count (§9).

use std::env;
use std::sync::Arc;
use std::time::Duration;

use authorization_core::event_store::EventStore;
use authorization_core::locking::DistributedLock;
use authorization_core::processors::mock::MockProcessor;
use authorization_core::processors::StaticProcessorRegistry;
use authorization_core::queue::FifoQueue;
use authorization_core::read_model::ReadModelStore;
use authorization_core::tokenization::StaticTokenizationClient;
use authorization_core::transaction::TransactionCoordinator;
use authorization_core::worker::{QueueConsumer, WorkerOrchestrator};
use authorization_core::Config;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
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
    let worker_id = env::var("WORKER_ID").unwrap_or_else(|_| format!("worker-{}", uuid::Uuid::new_v4()));

    tracing::info!(worker_id = %worker_id, "starting authorization-worker");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    if !authorization_core::db::check_schema(&pool).await? {
        tracing::error!("database schema is not complete, run migrations first");
        return Err(anyhow::anyhow!("database schema incomplete"));
    }

    let event_store = EventStore::new(pool.clone());
    let read_model = ReadModelStore::new(pool.clone());
    let lock = DistributedLock::new(pool.clone());
    let coordinator = TransactionCoordinator::new(event_store.clone(), read_model.clone());

    // NOTE: the tokenization service and payment processors are external
    // collaborators out of scope for this crate (§1). Production wiring
    // swaps these for real HTTP-backed implementations of the
    // `TokenizationClient` / `PaymentProcessor` traits.
    let tokenization = Arc::new(StaticTokenizationClient::new());
    let processors = Arc::new(StaticProcessorRegistry::new().with_processor(Arc::new(MockProcessor::new())));

    let orchestrator = Arc::new(WorkerOrchestrator::new(
        event_store,
        read_model,
        lock,
        coordinator,
        tokenization,
        processors,
        config.max_retries,
        config.lock_ttl_seconds,
    ));

    let queue = Arc::new(FifoQueue::new(Duration::from_secs(
        config.visibility_timeout_seconds as u64,
    )));

    let consumer = QueueConsumer::new(
        queue,
        orchestrator,
        worker_id,
        Duration::from_secs(config.queue_wait_time_seconds as u64),
        10,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::select! {
        _ = consumer.run(shutdown_rx) => {}
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining in-flight message...");
            let _ = shutdown_tx.send(true);
        }
    }

    pool.close().await;
    tracing::info!("authorization-worker stopped");

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
