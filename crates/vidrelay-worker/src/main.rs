use anyhow::Result;
use futures::future::join_all;
use tokio::sync::watch;

use vidrelay_core::WorkerConfig;
use vidrelay_infra::{init_telemetry, shutdown_telemetry, DEFAULT_FILTER};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = WorkerConfig::from_env()?;

    init_telemetry(config.log_format, DEFAULT_FILTER)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;
    tracing::info!(environment = %config.environment, "Configuration loaded and validated");

    let consumers = vidrelay_worker::setup::initialize(&config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles: Vec<_> = consumers
        .into_iter()
        .map(|consumer| tokio::spawn(consumer.run(shutdown_rx.clone())))
        .collect();

    shutdown_signal().await?;
    let _ = shutdown_tx.send(true);

    for result in join_all(handles).await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Consumer task ended abnormally");
        }
    }

    tracing::info!("All consumers stopped");
    shutdown_telemetry().await;
    Ok(())
}

/// Wait for Ctrl+C (SIGINT) or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Received Ctrl+C signal");
            },
            _ = terminate.recv() => {
                tracing::info!("Received terminate signal");
            },
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C signal");
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
