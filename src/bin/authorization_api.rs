//! authorization-api
//!
//! HTTP intake service: `POST /v1/authorize` and `GET
//! /v1/authorize/{id}/status` (§4.6, §6).

use std::net::SocketAddr;
use std::sync::Arc;

use authorization_core::api::routes::{create_router, AppState};
use authorization_core::Config;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authorization_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("starting authorization-api");
    tracing::info!("connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    if !authorization_core::db::check_schema(&pool).await? {
        tracing::error!("database schema is not complete, run migrations first");
        return Err(anyhow::anyhow!("database schema incomplete"));
    }

    tracing::info!("database connected");

    let state = AppState::new(pool.clone(), Arc::new(config));
    let app = create_router(state).layer(TraceLayer::new_for_http());

    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutting down, draining in-flight requests...");
    pool.close().await;
    tracing::info!("database connections closed, goodbye");

    Ok(())
}

/// Graceful shutdown: intake drains in-flight requests rather than
/// killing them mid-transaction (§5).
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
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown...");
        },
    }
}
