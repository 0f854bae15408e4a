use anyhow::{Context, Result};
use colored::Colorize;
use syspulse::{
    config::Config,
    queue,
    signals::setup_signal_handlers,
    store,
    worker::{self, AccumulatorConfig},
};
use tracing::{info, warn};

/// Execute the worker command: drain the durable queue into the store
pub async fn execute(cfg: Config) -> Result<()> {
    super::require_shared_queue(&cfg, "worker")?;
    println!("{}", "Starting SysPulse worker...".green());

    let (shutdown_tx, signal_handle) =
        setup_signal_handlers().context("Failed to install signal handlers")?;

    let queue = queue::open(&cfg.queue)
        .await
        .context("Failed to open log queue")?;
    let store = store::open(&cfg.database)
        .await
        .context("Failed to open log store")?;

    let report = worker::spawn_worker(
        queue,
        store,
        AccumulatorConfig::from(&cfg.worker),
        shutdown_tx.subscribe(),
    )
    .await?;
    signal_handle.abort();

    if report.unpersisted > 0 {
        warn!(unpersisted = report.unpersisted, "Exited with logs that were never persisted");
    }
    info!(flushed = report.flushed, "Worker stopped");

    Ok(())
}
