//! Dispatcher server entry point.

use std::error::Error;

use dispatcher::Config;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Builds the router over `store` and serves it until shutdown.
async fn serve<S: Store + Clone + 'static>(
    store: S,
    config: &Config,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Result<(), BoxError> {
    let state = dispatcher::create_default_state(store, config.request_timeout);
    let app = dispatcher::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, timeout_ms = config.request_timeout.as_millis() as u64, "starting dispatcher");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick the store and serve
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(url)
                .await?;
            let store = PostgresStore::new(pool);
            store.run_migrations().await?;
            tracing::info!(max_connections = config.db_max_connections, "connected to PostgreSQL");
            serve(store, &config, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            serve(InMemoryStore::new(), &config, metrics_handle).await
        }
    }
}
