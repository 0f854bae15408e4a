use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub query: QueryConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// `text` or `json`
    pub log_format: String,
    /// `*` allows any origin
    pub cors_allow_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            cors_allow_origin: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:./data/syspulse.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Durable SQLite-backed list, shared between processes
    Sqlite,
    /// In-process only; valid when API and worker run in the same process
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    pub url: String,
    /// Logical list name; several queues may share one database
    pub name: String,
    pub max_connections: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Sqlite,
            url: "sqlite:./data/queue.db".to_string(),
            name: "logs".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub idle_wait_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_retry_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_interval_ms: 5000,
            idle_wait_ms: 500,
            retry_backoff_ms: 1000,
            max_retry_backoff_ms: 30_000,
        }
    }
}

impl WorkerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    pub page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { page_size: 50 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/metrics".to_string(),
        }
    }
}

/// Load configuration from an optional TOML file, overridden by
/// `SYSPULSE__SECTION__KEY` environment variables.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("SYSPULSE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.worker.batch_size == 0 {
        anyhow::bail!("worker.batch_size must be at least 1");
    }

    if cfg.worker.flush_interval_ms == 0 {
        anyhow::bail!("worker.flush_interval_ms must be greater than zero");
    }

    if cfg.worker.idle_wait_ms == 0 {
        anyhow::bail!("worker.idle_wait_ms must be greater than zero");
    }

    if cfg.worker.max_retry_backoff_ms < cfg.worker.retry_backoff_ms {
        anyhow::bail!(
            "worker.max_retry_backoff_ms ({}) is below worker.retry_backoff_ms ({})",
            cfg.worker.max_retry_backoff_ms,
            cfg.worker.retry_backoff_ms
        );
    }

    if cfg.query.page_size == 0 {
        anyhow::bail!("query.page_size must be at least 1");
    }

    if cfg.database.max_connections == 0 || cfg.queue.max_connections == 0 {
        anyhow::bail!("max_connections must be at least 1");
    }

    if cfg.queue.name.is_empty() {
        anyhow::bail!("queue.name cannot be empty");
    }

    match cfg.server.log_format.as_str() {
        "text" | "json" => {}
        other => anyhow::bail!("Invalid server.log_format '{}', expected 'text' or 'json'", other),
    }

    if cfg.metrics.enabled && !cfg.metrics.endpoint.starts_with('/') {
        anyhow::bail!("metrics.endpoint must start with '/'");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(validate_config(&cfg).is_ok());
        assert_eq!(cfg.worker.batch_size, 10);
        assert_eq!(cfg.worker.flush_interval(), Duration::from_secs(5));
        assert_eq!(cfg.worker.idle_wait(), Duration::from_millis(500));
        assert_eq!(cfg.query.page_size, 50);
        assert_eq!(cfg.queue.backend, QueueBackend::Sqlite);
    }

    #[test]
    fn test_validate_config_rejects_zero_batch_size() {
        let mut cfg = Config::default();
        cfg.worker.batch_size = 0;

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("batch_size"));
    }

    #[test]
    fn test_validate_config_rejects_inverted_backoff() {
        let mut cfg = Config::default();
        cfg.worker.retry_backoff_ms = 5000;
        cfg.worker.max_retry_backoff_ms = 100;

        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_config_rejects_unknown_log_format() {
        let mut cfg = Config::default();
        cfg.server.log_format = "yaml".to_string();

        let result = validate_config(&cfg);
        assert!(result.unwrap_err().to_string().contains("log_format"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syspulse.toml");
        std::fs::write(
            &path,
            r#"
[worker]
batch_size = 25

[queue]
backend = "memory"
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.worker.batch_size, 25);
        assert_eq!(cfg.worker.flush_interval_ms, 5000);
        assert_eq!(cfg.queue.backend, QueueBackend::Memory);
        assert_eq!(cfg.server.port, 3000);
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.database.url, "sqlite:./data/syspulse.db");
    }
}
