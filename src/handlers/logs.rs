//! `POST /logs` ingestion and `GET /logs` filtered reads

use crate::error::{AppError, ValidationError};
use crate::model::{IncomingLog, StoredLog};
use crate::queue::LogQueue;
use crate::store::filter::{parse_bound, Bound};
use crate::store::{LogFilter, LogStore};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for the log endpoints
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn LogQueue>,
    pub store: Arc<dyn LogStore>,
    pub page_size: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AcceptedResponse {
    pub status: String,
    pub message: String,
}

/// POST /logs - validate one record and push it onto the queue
pub async fn post_log(
    State(state): State<AppState>,
    payload: Result<Json<IncomingLog>, JsonRejection>,
) -> Result<Json<AcceptedResponse>, AppError> {
    let record = payload
        .map_err(|rejection| ValidationError::MalformedRequest(rejection.body_text()))
        .and_then(|Json(incoming)| incoming.validate(chrono::Utc::now()))
        .map_err(|e| {
            crate::metrics::record_rejected(e.reason());
            tracing::debug!(error = %e, "Rejected log record");
            e
        })?;

    if let Err(e) = state.queue.enqueue(&record).await {
        tracing::error!(error = %e, service = %record.service, "Error ingesting log");
        return Err(e.into());
    }

    crate::metrics::record_ingested(record.level);

    Ok(Json(AcceptedResponse {
        status: "Accepted".to_string(),
        message: "Log ingested successfully".to_string(),
    }))
}

/// Query parameters for the logs read API
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQueryParams {
    pub level: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<usize>,
}

impl LogQueryParams {
    /// Empty parameters count as absent
    pub fn into_filter(self) -> Result<LogFilter, ValidationError> {
        let start = present(self.start_date)
            .map(|value| parse_bound("startDate", &value, Bound::Start))
            .transpose()?;
        let end = present(self.end_date)
            .map(|value| parse_bound("endDate", &value, Bound::End))
            .transpose()?;

        Ok(LogFilter {
            level: present(self.level),
            search: present(self.search),
            start,
            end,
            limit: self.limit,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// GET /logs - newest-first persisted records matching the filters
///
/// Example: GET /logs?level=ERROR&search=timeout&startDate=2024-01-01
pub async fn get_logs(
    State(state): State<AppState>,
    params: Result<Query<LogQueryParams>, QueryRejection>,
) -> Result<Json<Vec<StoredLog>>, AppError> {
    let Query(params) =
        params.map_err(|rejection| ValidationError::MalformedRequest(rejection.body_text()))?;
    let filter = params.into_filter()?;

    let logs = state.store.query(&filter, state.page_size).await?;

    Ok(Json(logs))
}
