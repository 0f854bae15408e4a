use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    config::Config,
    handlers::{self, logs::AppState},
    signals::ShutdownSignal,
};

/// Upper bound for a single ingestion body
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Bind the configured address and serve the API until `shutdown` fires
pub async fn start_server(
    config: &Config,
    state: AppState,
    metrics_handle: Option<Arc<PrometheusHandle>>,
    mut shutdown: broadcast::Receiver<ShutdownSignal>,
) -> Result<()> {
    let app = create_router(config, state, metrics_handle)?;

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting SysPulse API on {}", addr);
    info!(
        "Configuration: queue backend {:?}, page size {}, metrics {}",
        config.queue.backend,
        config.query.page_size,
        if config.metrics.enabled { "enabled" } else { "disabled" }
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    info!("API server stopped");
    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(
    config: &Config,
    state: AppState,
    metrics_handle: Option<Arc<PrometheusHandle>>,
) -> Result<Router> {
    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/logs",
            get(handlers::logs::get_logs).post(handlers::logs::post_log),
        )
        .with_state(state);

    if let Some(handle) = metrics_handle {
        let metrics_routes = Router::new()
            .route(
                &config.metrics.endpoint,
                get(handlers::metrics_handler::metrics),
            )
            .with_state(handle);
        app = app.merge(metrics_routes);
    }

    Ok(app
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(&config.server.cors_allow_origin)?)
        .layer(TraceLayer::new_for_http()))
}

fn cors_layer(allow_origin: &str) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if allow_origin == "*" {
        return Ok(layer.allow_origin(Any));
    }

    let origin = HeaderValue::from_str(allow_origin)
        .map_err(|e| anyhow::anyhow!("Invalid cors_allow_origin '{}': {}", allow_origin, e))?;
    Ok(layer.allow_origin(origin))
}
