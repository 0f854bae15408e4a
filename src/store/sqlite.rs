//! SQLite log store
//!
//! Timestamps are stored as fixed-width RFC 3339 text (see
//! `model::format_timestamp`) so range filters compare correctly as text.

use super::filter::{build_select, LogFilter, SqlParam};
use super::{LogStore, StoreError};
use crate::model::{format_timestamp, Level, LogRecord, StoredLog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

/// SQLite's default cap on bound variables per statement
const SQLITE_MAX_VARIABLES: usize = 32766;

/// Columns bound per inserted row
const INSERT_COLUMNS: usize = 5;

const MAX_ROWS_PER_STATEMENT: usize = SQLITE_MAX_VARIABLES / INSERT_COLUMNS;

pub struct SqliteLogStore {
    pool: SqlitePool,
}

impl SqliteLogStore {
    /// Connect and run the store migrations
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = crate::db::connect(
            database_url,
            max_connections,
            sqlx::migrate!("./migrations/store"),
        )
        .await?;

        Ok(Self { pool })
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn insert_batch(&self, records: &[LogRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        // Encode up front so a codec failure aborts before anything is written
        let metadata = records
            .iter()
            .map(|record| record.metadata.as_ref().map(serde_json::to_string).transpose())
            .collect::<Result<Vec<Option<String>>, _>>()?;

        // Statements are split to stay under the bind limit; the transaction
        // keeps the batch all-or-nothing
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for (chunk, metadata) in records
            .chunks(MAX_ROWS_PER_STATEMENT)
            .zip(metadata.chunks(MAX_ROWS_PER_STATEMENT))
        {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO logs (service, level, message, metadata, timestamp) ",
            );
            builder.push_values(chunk.iter().zip(metadata), |mut row, (record, metadata)| {
                row.push_bind(record.service.clone())
                    .push_bind(record.level.as_str())
                    .push_bind(record.message.clone())
                    .push_bind(metadata.clone())
                    .push_bind(format_timestamp(&record.timestamp));
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn query(
        &self,
        filter: &LogFilter,
        page_size: usize,
    ) -> Result<Vec<StoredLog>, StoreError> {
        let (sql, params) = build_select(filter, page_size);

        let mut query = sqlx::query(&sql);
        for param in params {
            query = match param {
                SqlParam::Text(value) => query.bind(value),
                SqlParam::Timestamp(ts) => query.bind(format_timestamp(&ts)),
                SqlParam::Integer(value) => query.bind(value),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &SqliteRow) -> Result<StoredLog, StoreError> {
    let id: i64 = row.try_get("id")?;
    let corrupt = |reason: String| StoreError::CorruptRow { id, reason };

    let level: String = row.try_get("level")?;
    let level = level.parse::<Level>().map_err(|e| corrupt(e.to_string()))?;

    let metadata = row
        .try_get::<Option<String>, _>("metadata")?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?;

    let timestamp: String = row.try_get("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| corrupt(format!("bad timestamp '{}': {}", timestamp, e)))?
        .with_timezone(&Utc);

    Ok(StoredLog {
        id,
        service: row.try_get("service")?,
        level,
        message: row.try_get("message")?,
        metadata,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    async fn create_test_store(dir: &tempfile::TempDir) -> SqliteLogStore {
        let url = format!("sqlite:{}", dir.path().join("logs.db").display());
        SqliteLogStore::connect(&url, 2).await.unwrap()
    }

    fn record(level: Level, message: &str, minutes: i64) -> LogRecord {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        LogRecord {
            service: "checkout".to_string(),
            level,
            message: message.to_string(),
            metadata: None,
            timestamp: base + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn test_insert_batch_assigns_monotonic_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;

        let inserted = store
            .insert_batch(&[
                record(Level::Info, "first", 0),
                record(Level::Info, "second", 0),
                record(Level::Info, "third", 0),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let rows = store.query(&LogFilter::default(), 50).await.unwrap();
        // equal timestamps fall back to id order, newest first
        let messages: Vec<_> = rows.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["third", "second", "first"]);
        assert!(rows[0].id > rows[1].id && rows[1].id > rows[2].id);
    }

    #[tokio::test]
    async fn test_batch_beyond_bind_limit_is_inserted_whole() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;

        let total = MAX_ROWS_PER_STATEMENT + 447;
        let batch: Vec<_> = (0..total)
            .map(|i| record(Level::Info, &format!("row {}", i), 0))
            .collect();

        assert_eq!(store.insert_batch(&batch).await.unwrap(), total as u64);
        assert_eq!(store.count().await.unwrap(), total as u64);

        // ids follow batch order across statement boundaries
        let newest = store.query(&LogFilter::default(), 1).await.unwrap();
        assert_eq!(newest[0].message, format!("row {}", total - 1));
        assert_eq!(newest[0].id, total as i64);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;

        assert_eq!(store.insert_batch(&[]).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_metadata_round_trips_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;

        let mut with_meta = record(Level::Debug, "with meta", 0);
        with_meta.metadata = Some(json!({"user": {"id": 7}, "flags": [true, null]}));
        store.insert_batch(&[with_meta.clone()]).await.unwrap();

        let rows = store.query(&LogFilter::default(), 50).await.unwrap();
        assert_eq!(rows[0].metadata, with_meta.metadata);
        assert_eq!(rows[0].timestamp, with_meta.timestamp);
        assert_eq!(rows[0].level, Level::Debug);
    }

    #[tokio::test]
    async fn test_level_and_search_conjunction() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;

        store
            .insert_batch(&[
                record(Level::Error, "Upstream TIMEOUT after 30s", 1),
                record(Level::Error, "connection refused", 2),
                record(Level::Warn, "timeout approaching", 3),
                record(Level::Error, "read timeout", 4),
            ])
            .await
            .unwrap();

        let filter = LogFilter {
            level: Some("ERROR".to_string()),
            search: Some("timeout".to_string()),
            ..Default::default()
        };
        let rows = store.query(&filter, 50).await.unwrap();

        let messages: Vec<_> = rows.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["read timeout", "Upstream TIMEOUT after 30s"]);
    }

    #[tokio::test]
    async fn test_date_bounds_are_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;

        let records: Vec<_> = (0..5)
            .map(|i| record(Level::Info, &format!("minute {}", i), i))
            .collect();
        store.insert_batch(&records).await.unwrap();

        let filter = LogFilter {
            start: Some(records[1].timestamp),
            end: Some(records[3].timestamp),
            ..Default::default()
        };
        let rows = store.query(&filter, 50).await.unwrap();

        let messages: Vec<_> = rows.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["minute 3", "minute 2", "minute 1"]);
    }

    #[tokio::test]
    async fn test_results_capped_at_page_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;

        let records: Vec<_> = (0..60)
            .map(|i| record(Level::Info, &format!("log {}", i), i))
            .collect();
        store.insert_batch(&records).await.unwrap();

        let rows = store.query(&LogFilter::default(), 50).await.unwrap();
        assert_eq!(rows.len(), 50);
        assert_eq!(rows[0].message, "log 59");

        let small = LogFilter {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(store.query(&small, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_filter_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;
        store.insert_batch(&[record(Level::Info, "hello", 0)]).await.unwrap();

        let filter = LogFilter {
            level: Some("NOPE".to_string()),
            ..Default::default()
        };
        assert!(store.query(&filter, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_test_store(&dir).await;
        store
            .insert_batch(&[
                record(Level::Info, "cpu at 100% load", 0),
                record(Level::Info, "cpu at 1000 load", 1),
            ])
            .await
            .unwrap();

        let filter = LogFilter {
            search: Some("100%".to_string()),
            ..Default::default()
        };
        let rows = store.query(&filter, 50).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message, "cpu at 100% load");
    }
}
