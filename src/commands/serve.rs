use anyhow::{Context, Result};
use colored::Colorize;
use syspulse::{
    config::Config, handlers::logs::AppState, queue, server, signals::setup_signal_handlers,
    store,
};

/// Execute the serve command: the HTTP API without a worker
pub async fn execute(cfg: Config) -> Result<()> {
    super::require_shared_queue(&cfg, "serve")?;
    println!("{}", "Starting SysPulse API...".green());

    let metrics_handle = super::init_metrics(&cfg)?;
    let (shutdown_tx, signal_handle) =
        setup_signal_handlers().context("Failed to install signal handlers")?;

    let queue = queue::open(&cfg.queue)
        .await
        .context("Failed to open log queue")?;
    let store = store::open(&cfg.database)
        .await
        .context("Failed to open log store")?;

    let state = AppState {
        queue,
        store,
        page_size: cfg.query.page_size,
    };

    let served = server::start_server(&cfg, state, metrics_handle, shutdown_tx.subscribe()).await;
    signal_handle.abort();

    served
}
