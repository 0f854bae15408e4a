//! Durable relational sink for log records

pub mod filter;
pub mod sqlite;

use crate::config::DatabaseConfig;
use crate::model::{LogRecord, StoredLog};
use async_trait::async_trait;
use std::sync::Arc;

pub use filter::{build_predicate, build_select, LogFilter, Predicate, SqlParam};
pub use sqlite::SqliteLogStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("metadata codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("corrupt row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Persist `records` in one all-or-nothing multi-row insert.
    ///
    /// Returns the number of rows written.
    async fn insert_batch(&self, records: &[LogRecord]) -> Result<u64, StoreError>;

    /// Rows matching `filter`, newest first, capped at `page_size`
    async fn query(&self, filter: &LogFilter, page_size: usize)
        -> Result<Vec<StoredLog>, StoreError>;
}

/// Open the configured store, applying migrations
pub async fn open(config: &DatabaseConfig) -> Result<Arc<dyn LogStore>, StoreError> {
    let store = SqliteLogStore::connect(&config.url, config.max_connections).await?;
    tracing::info!(url = %config.url, "Connected to log store");
    Ok(Arc::new(store))
}
