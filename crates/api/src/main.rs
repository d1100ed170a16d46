use std::time::Duration;

use anyhow::Context;

use bulksend_api::app::{self, services};
use bulksend_api::config::AppConfig;

const RETENTION_SWEEP_EVERY: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    bulksend_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(?config, "configuration loaded");

    let (services, executor) = services::build_services(&config);
    let pruner = services::spawn_pruner(services.orchestrator.clone(), RETENTION_SWEEP_EVERY);
    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    pruner.abort();
    tracing::info!(stats = ?executor.stats(), "draining job executor");
    executor.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
