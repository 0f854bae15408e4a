pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod model;
pub mod queue;
pub mod server;
pub mod signals;
pub mod store;
pub mod worker;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// `RUST_LOG` overrides `log_level` when set. `log_format` is `text` or
/// `json`. Can only be called once per process.
pub fn init_tracing(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        registry
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
