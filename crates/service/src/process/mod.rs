//! Service bootstrap: logging, state setup, background tasks, and
//! graceful shutdown. The HTTP layer mounts on top of `State` and is
//! outside this crate.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::{Config, State};

const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn spawn_service(config: &Config) {
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.log_level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stdout_layer).init();

    let state = match State::from_config(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating service state: {}", e);
            std::process::exit(3);
        }
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    let mut handles = Vec::new();

    // Spawn the expiry reaper
    let reaper = state.reaper().clone();
    let reaper_rx = shutdown_rx.clone();
    let sweep_interval = state.sweep_interval();
    handles.push(tokio::spawn(async move {
        reaper.run(sweep_interval, reaper_rx).await;
    }));

    tracing::info!("strongroom service started");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(());

    if timeout(FINAL_SHUTDOWN_TIMEOUT, join_all(handles))
        .await
        .is_err()
    {
        tracing::error!(
            "Failed to shut down within {} seconds",
            FINAL_SHUTDOWN_TIMEOUT.as_secs()
        );
        std::process::exit(4);
    }

    state.vault().database().close().await;
}
