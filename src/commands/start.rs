use anyhow::{Context, Result};
use colored::Colorize;
use syspulse::{
    config::Config,
    handlers::logs::AppState,
    queue, server,
    signals::{setup_signal_handlers, ShutdownSignal},
    store,
    worker::{self, AccumulatorConfig},
};
use tracing::{info, warn};

/// Execute the start command
///
/// Runs the API and the persistence worker against the same queue. On
/// shutdown the server drains first, then the worker makes its final flush.
pub async fn execute(cfg: Config) -> Result<()> {
    println!("{}", "Starting SysPulse (API + worker)...".green());

    let metrics_handle = super::init_metrics(&cfg)?;
    let (shutdown_tx, signal_handle) =
        setup_signal_handlers().context("Failed to install signal handlers")?;

    let queue = queue::open(&cfg.queue)
        .await
        .context("Failed to open log queue")?;
    let store = store::open(&cfg.database)
        .await
        .context("Failed to open log store")?;

    let worker_handle = worker::spawn_worker(
        queue.clone(),
        store.clone(),
        AccumulatorConfig::from(&cfg.worker),
        shutdown_tx.subscribe(),
    );

    let state = AppState {
        queue,
        store,
        page_size: cfg.query.page_size,
    };

    let served = server::start_server(&cfg, state, metrics_handle, shutdown_tx.subscribe()).await;

    // The server can also stop on its own (bind failure); the worker must follow
    let _ = shutdown_tx.send(ShutdownSignal::Graceful);
    let report = worker_handle.await?;
    signal_handle.abort();

    if report.unpersisted > 0 {
        warn!(unpersisted = report.unpersisted, "Exited with logs that were never persisted");
    }
    info!(flushed = report.flushed, "SysPulse stopped");

    served
}
