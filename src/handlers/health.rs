use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

/// Liveness only; says nothing about queue or store reachability
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "OK",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "message": "SysPulse backend is running",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
