//! Durable intermediate queue between ingestion and persistence
//!
//! The queue is a list of JSON-serialized `LogRecord`s: the ingestion
//! endpoint pushes to the tail, the batch accumulator pops from the head.
//! There is no acknowledgment protocol; a popped entry is gone for good.

pub mod memory;
pub mod sqlite;

use crate::config::{QueueBackend, QueueConfig};
use crate::model::LogRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemoryQueue;
pub use sqlite::SqliteQueue;

/// Poll cadence used by the default blocking pop
const BLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue transport error: {0}")]
    Transport(#[from] sqlx::Error),

    #[error("queue entry codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

/// FIFO list of serialized log records
#[async_trait]
pub trait LogQueue: Send + Sync {
    /// Append one serialized entry to the tail
    async fn push(&self, payload: String) -> Result<(), QueueError>;

    /// Pop the head entry without blocking; `None` when empty
    async fn dequeue(&self) -> Result<Option<String>, QueueError>;

    /// Number of entries waiting
    async fn len(&self) -> Result<u64, QueueError>;

    /// Serialize `record` and append it to the tail.
    ///
    /// An error means the record was not accepted.
    async fn enqueue(&self, record: &LogRecord) -> Result<(), QueueError> {
        let payload = serde_json::to_string(record)?;
        self.push(payload).await
    }

    /// Pop the head entry, waiting up to `timeout` for one to arrive
    async fn dequeue_blocking(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(payload) = self.dequeue().await? {
                return Ok(Some(payload));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(BLOCKING_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Decode one queue entry back into a record
pub fn decode(payload: &str) -> Result<LogRecord, QueueError> {
    Ok(serde_json::from_str(payload)?)
}

/// Open the queue backend selected in configuration
pub async fn open(config: &QueueConfig) -> Result<Arc<dyn LogQueue>, QueueError> {
    match config.backend {
        QueueBackend::Sqlite => {
            let queue =
                SqliteQueue::connect(&config.url, &config.name, config.max_connections).await?;
            tracing::info!(url = %config.url, queue = %config.name, "Connected to durable queue");
            Ok(Arc::new(queue))
        }
        QueueBackend::Memory => {
            tracing::warn!("Using in-memory queue; queued records do not survive a restart");
            Ok(Arc::new(MemoryQueue::new()))
        }
    }
}
