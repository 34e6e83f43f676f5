//! Sequential identifier allocation service.
//!
//! Stateless HTTP front end over a shared counter store. Any number of instances can
//! run against the same `PostgreSQL` database; uniqueness comes from the store's
//! transaction isolation alone.

mod config;

use anyhow::Context;
use config::{Config, StoreBackend};
use seqalloc_core::store::TransactionalStore;
use seqalloc_postgres::PostgresCounterStore;
use seqalloc_runtime::metrics::MetricsExporter;
use seqalloc_runtime::SequenceAllocator;
use seqalloc_testing::InMemoryCounterStore;
use seqalloc_web::{build_router, AppState};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seqalloc=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting sequence allocation server");

    let config = Config::from_env()?;
    info!(
        store = ?config.store,
        max_attempts = config.allocator.max_attempts,
        metrics_enabled = config.server.metrics_enabled,
        "Configuration loaded"
    );

    let store = build_store(&config).await?;
    let allocator = SequenceAllocator::new(store).with_policy(config.allocator.retry_policy());

    let mut state = AppState::new(allocator);
    if config.server.metrics_enabled {
        let mut exporter = MetricsExporter::new();
        exporter
            .install()
            .context("Failed to install metrics exporter")?;
        if let Some(handle) = exporter.handle() {
            state = state.with_metrics(handle.clone());
        }
    }

    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    let stopping = Arc::new(Notify::new());
    let server = axum::serve(listener, app)
        .with_graceful_shutdown({
            let stopping = Arc::clone(&stopping);
            async move {
                shutdown_signal().await;
                stopping.notify_one();
            }
        })
        .into_future();

    let drain_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let drain_deadline = async {
        stopping.notified().await;
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = server => result.context("Server error")?,
        () = drain_deadline => {
            warn!(
                timeout_secs = config.server.shutdown_timeout,
                "Shutdown timeout elapsed, abandoning in-flight requests"
            );
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn TransactionalStore>> {
    match config.store {
        StoreBackend::Postgres => {
            info!("Connecting to counter store database...");
            let store = PostgresCounterStore::connect_with(
                &config.postgres.url,
                &config.postgres.pool_settings(),
            )
            .await
            .context("Failed to connect to PostgreSQL")?;

            if config.postgres.run_migrations {
                store.migrate().await.context("Failed to run migrations")?;
                info!("Migrations applied");
            }

            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory counter store; counters are per process and lost on restart");
            Ok(Arc::new(InMemoryCounterStore::new()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
