//! Log record types flowing through the pipeline
//!
//! `IncomingLog` is the unvalidated HTTP payload, `LogRecord` the accepted
//! (immutable) record that travels through the queue and the buffer, and
//! `StoredLog` a persisted row carrying its storage-assigned id.

use crate::error::ValidationError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warn,
    Error,
    Fatal,
    Debug,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
        Level::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ValidationError;

    /// Exact, case-sensitive match against the allowed set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidLevel(s.to_string()))
    }
}

/// An accepted log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub service: String,
    pub level: Level,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Raw ingest payload before validation
///
/// A client `timestamp` field is accepted in the body but not read; the
/// server clock stamps every record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingLog {
    pub service: Option<String>,
    pub level: Option<String>,
    pub message: Option<String>,
    /// Also accepted as `meta`. Sending both keys is a duplicate field and
    /// the body is rejected as malformed.
    #[serde(default, alias = "meta")]
    pub metadata: Option<serde_json::Value>,
}

impl IncomingLog {
    /// Validate the payload and freeze it into a `LogRecord` stamped `now`.
    pub fn validate(self, now: DateTime<Utc>) -> Result<LogRecord, ValidationError> {
        let (service, level, message) = match (
            non_empty(self.service),
            non_empty(self.level),
            non_empty(self.message),
        ) {
            (Some(service), Some(level), Some(message)) => (service, level, message),
            _ => return Err(ValidationError::MissingFields),
        };

        let level = level.parse::<Level>()?;

        Ok(LogRecord {
            service,
            level,
            message,
            metadata: self.metadata.filter(|value| !value.is_null()),
            timestamp: now,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// A persisted row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLog {
    pub id: i64,
    pub service: String,
    pub level: Level,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Fixed-width UTC rendering used for stored timestamps, so that textual
/// comparison in SQL matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
