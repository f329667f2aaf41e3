//! Errands Echo Worker
//!
//! A minimal worker that processes errands of one topic with [`EchoHandler`].
//!
//! Configuration comes from the environment. The worker polls until it
//! receives SIGINT or SIGTERM, then stops polling and waits for in-flight
//! errands to be reported before exiting.

mod config;
mod handler;

use anyhow::{Context, Result};
use errands_client::ErrandsClient;
use errands_processor::Processor;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::handler::EchoHandler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "errands_echo=info,errands_processor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!("application closing fatally: {:#}", e);
        return Err(e);
    }

    Ok(())
}

async fn run() -> Result<()> {
    let config = Config::from_env().context("process env config")?;
    config.validate()?;
    info!(
        "Loaded configuration: errands_url={}, topic={}, concurrency={}",
        config.errands_url, config.topic, config.concurrency
    );

    let client = Arc::new(ErrandsClient::new(config.errands_url.clone()));

    let processor = Processor::start(client, Arc::new(EchoHandler), config.processor_config())
        .context("new errand processor")?;

    wait_for_shutdown_signal().await?;

    info!("Shutdown signal received, draining in-flight errands");
    processor.shutdown().await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).context("install SIGTERM handler")?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("listen for SIGINT")?,
        _ = terminate.recv() => {}
    }

    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await.context("listen for ctrl-c")?;
    Ok(())
}
