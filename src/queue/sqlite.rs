//! SQLite-backed durable queue
//!
//! Entries live in the `log_queue` table, ordered by their autoincrement id.
//! Several named queues can share one table. A pop is a single
//! `DELETE ... RETURNING` statement, so concurrent poppers never receive
//! the same entry.

use super::{LogQueue, QueueError};
use crate::model::format_timestamp;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

pub struct SqliteQueue {
    pool: SqlitePool,
    name: String,
}

impl SqliteQueue {
    /// Connect to `database_url`, creating the queue table if needed
    pub async fn connect(
        database_url: &str,
        name: &str,
        max_connections: u32,
    ) -> Result<Self, QueueError> {
        let pool = crate::db::connect(
            database_url,
            max_connections,
            sqlx::migrate!("./migrations/queue"),
        )
        .await?;

        Ok(Self::from_pool(pool, name))
    }

    /// Wrap an already migrated pool
    pub fn from_pool(pool: SqlitePool, name: &str) -> Self {
        Self {
            pool,
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl LogQueue for SqliteQueue {
    async fn push(&self, payload: String) -> Result<(), QueueError> {
        sqlx::query("INSERT INTO log_queue (queue, payload, enqueued_at) VALUES (?, ?, ?)")
            .bind(&self.name)
            .bind(payload)
            .bind(format_timestamp(&chrono::Utc::now()))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<String>, QueueError> {
        let row = sqlx::query(
            "DELETE FROM log_queue
             WHERE id = (SELECT id FROM log_queue WHERE queue = ? ORDER BY id ASC LIMIT 1)
             RETURNING payload",
        )
        .bind(&self.name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("payload")?)),
            None => Ok(None),
        }
    }

    async fn len(&self) -> Result<u64, QueueError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM log_queue WHERE queue = ?")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}
