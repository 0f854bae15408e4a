//! Command implementations for the CLI
//!
//! - start: API and persistence worker in one process
//! - serve: API only
//! - worker: persistence worker only
//! - config: configuration display and validation

pub mod config;
pub mod serve;
pub mod start;
pub mod worker;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use syspulse::config::{Config, QueueBackend};
use tracing::info;

/// Install the Prometheus recorder when metrics are enabled
pub(crate) fn init_metrics(cfg: &Config) -> Result<Option<Arc<PrometheusHandle>>> {
    if !cfg.metrics.enabled {
        return Ok(None);
    }

    info!("Initializing Prometheus metrics...");
    Ok(Some(Arc::new(syspulse::metrics::init_metrics()?)))
}

/// The in-memory queue is process-local, so split deployments need the durable one
pub(crate) fn require_shared_queue(cfg: &Config, command: &str) -> Result<()> {
    if cfg.queue.backend == QueueBackend::Memory {
        anyhow::bail!(
            "'{}' runs half of the pipeline and needs queue.backend = \"sqlite\"; \
             use 'start' for the in-memory queue",
            command
        );
    }
    Ok(())
}
