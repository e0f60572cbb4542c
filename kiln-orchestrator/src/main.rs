use anyhow::Context;
use kiln_orchestrator::{api, config::Config, service::BuildRunner, startup};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for cancelled builds to record their outcome
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kiln_orchestrator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Kiln Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Using data directory {}", config.data_dir.display());

    let instance = startup::start(&config).context("Failed to start orchestrator")?;
    let runner = instance.state.runner.clone();

    // Build router with all API endpoints
    let app = api::create_router(instance.state.clone());

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(runner.clone()))
        .await
        .context("Server error")?;

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while runner.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            "{} build(s) still running at shutdown",
            runner.active_count()
        );
    }

    drop(instance);
    tracing::info!("Orchestrator stopped");
    Ok(())
}

/// Resolves on Ctrl-C after cancelling in-flight builds, so requests waiting
/// on a build can complete before the server stops.
async fn shutdown_signal(runner: BuildRunner) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");

    let cancelled = runner.cancel_all();
    if cancelled > 0 {
        tracing::info!("Cancelling {} in-flight build(s)", cancelled);
    }
}
