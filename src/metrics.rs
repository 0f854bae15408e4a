use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use crate::model::Level;

/// Install the Prometheus recorder.
///
/// Fails if a recorder is already installed for this process.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "syspulse_logs_ingested_total",
        "Log records accepted and enqueued"
    );
    describe_counter!(
        "syspulse_logs_rejected_total",
        "Log records rejected at ingestion"
    );
    describe_counter!(
        "syspulse_logs_persisted_total",
        "Log records written to the store"
    );
    describe_counter!(
        "syspulse_flush_failures_total",
        "Batch inserts that failed and were requeued in memory"
    );
    describe_histogram!(
        "syspulse_flush_duration_seconds",
        "Duration of batch insert attempts"
    );
    describe_gauge!(
        "syspulse_buffer_size",
        "Records held in the worker buffer"
    );
    describe_gauge!(
        "syspulse_queue_depth",
        "Entries waiting in the durable queue, sampled by the worker"
    );
    describe_gauge!("syspulse_info", "Build information");

    gauge!("syspulse_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

pub fn record_ingested(level: Level) {
    counter!("syspulse_logs_ingested_total", "level" => level.as_str()).increment(1);
}

pub fn record_rejected(reason: &'static str) {
    counter!("syspulse_logs_rejected_total", "reason" => reason).increment(1);
}

pub fn record_flush(count: usize, duration: Duration) {
    counter!("syspulse_logs_persisted_total").increment(count as u64);
    histogram!("syspulse_flush_duration_seconds", "outcome" => "success")
        .record(duration.as_secs_f64());
}

pub fn record_flush_failure(duration: Duration) {
    counter!("syspulse_flush_failures_total").increment(1);
    histogram!("syspulse_flush_duration_seconds", "outcome" => "failure")
        .record(duration.as_secs_f64());
}

pub fn set_buffer_size(size: usize) {
    gauge!("syspulse_buffer_size").set(size as f64);
}

pub fn set_queue_depth(depth: u64) {
    gauge!("syspulse_queue_depth").set(depth as f64);
}
