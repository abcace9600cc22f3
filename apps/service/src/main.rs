use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use logger::init_tracing;
use uptrack_service::{Config, Orchestrator};

/// Headless URL monitor: checks every configured URL on an interval and
/// logs each UP/DOWN transition.
#[derive(Debug, Parser)]
#[command(name = "uptrack-service", version, about)]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/uptrack/config.toml)
    #[arg(long, env = "UPTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// URL to monitor; repeat for several
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// Seconds between monitoring cycles, overriding the config file
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_config(cli.config.as_ref()).context("failed to load configuration")?;
    if let Some(interval) = cli.interval {
        config.monitoring.interval_seconds = interval;
    }
    config.validate().context("invalid configuration")?;
    info!("{config}");

    let orchestrator = Orchestrator::from_config(&config.monitoring)?;

    let restored = orchestrator.restore().await.context("failed to restore snapshot")?;
    if restored > 0 {
        info!(count = restored, "Restored monitored URLs");
    }

    for url in &cli.urls {
        match orchestrator.registry().add(url) {
            Ok(added) => info!(id = %added.id, url = %added.url, "Added URL from command line"),
            Err(e) => warn!(url = %url, error = %e, "Skipping command-line URL"),
        }
    }

    if orchestrator.registry().is_empty() {
        warn!("No URLs to monitor; pass --url or configure a snapshot");
    }

    let notifier = tokio::spawn(log_status_changes(orchestrator.clone()));

    orchestrator.start_monitoring();
    info!(
        interval_s = orchestrator.scheduler().interval().as_secs(),
        urls = orchestrator.registry().len(),
        "Monitoring; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("Shutting down");

    orchestrator.stop_monitoring();
    notifier.abort();

    // Give in-flight probes from the last cycle a moment to land.
    tokio::time::sleep(Duration::from_millis(250)).await;
    if let Err(e) = orchestrator.persist().await {
        error!(error = %e, "Failed to save snapshot");
    }

    Ok(())
}

async fn log_status_changes(orchestrator: Orchestrator) {
    let mut changes = orchestrator.subscribe();

    loop {
        match changes.recv().await {
            Ok(change) => warn!(
                id = %change.id,
                url = %change.url,
                old = %change.old_status,
                new = %change.new_status,
                response_time_ms = ?change.response_time_ms,
                "Status changed"
            ),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Status change listener fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
