//! SQLite connection setup shared by the durable queue and the log store

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Open a pool and apply `migrator`.
///
/// Queue and store migrations may target the same database file, so
/// migrations belonging to the other set are ignored rather than rejected.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    mut migrator: Migrator,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30))
        .pragma("synchronous", "NORMAL");

    // SQLite creates the file but not its directory (default paths live under ./data)
    if let Some(parent) = options
        .get_filename()
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;

    migrator.set_ignore_missing(true);
    migrator.run(&pool).await?;

    Ok(pool)
}
