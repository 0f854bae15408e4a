//! Filtered select construction
//!
//! Filters map to a conjunction of only the clauses actually supplied, and
//! every value travels as a bound parameter. Both builders are pure so the
//! generated SQL can be checked without a database.

use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Filter for log queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    /// Exact level match. Values outside the level set simply match nothing.
    pub level: Option<String>,

    /// Case-insensitive substring of the message
    pub search: Option<String>,

    /// Inclusive lower bound on the timestamp
    pub start: Option<DateTime<Utc>>,

    /// Inclusive upper bound on the timestamp
    pub end: Option<DateTime<Utc>>,

    /// Requested row count, clamped to the page size
    pub limit: Option<usize>,
}

impl LogFilter {
    pub fn effective_limit(&self, page_size: usize) -> usize {
        let page_size = page_size.max(1);
        self.limit.unwrap_or(page_size).clamp(1, page_size)
    }
}

/// A value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Timestamp(DateTime<Utc>),
    Integer(i64),
}

/// WHERE-clause body (without the keyword) and its parameters, in
/// placeholder order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub clause: String,
    pub params: Vec<SqlParam>,
}

impl Predicate {
    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }
}

pub fn build_predicate(filter: &LogFilter) -> Predicate {
    let mut conditions: Vec<&'static str> = Vec::new();
    let mut params = Vec::new();

    if let Some(level) = &filter.level {
        conditions.push("level = ?");
        params.push(SqlParam::Text(level.clone()));
    }

    if let Some(search) = &filter.search {
        // SQLite LIKE is case-insensitive for ASCII
        conditions.push("message LIKE ? ESCAPE '\\'");
        params.push(SqlParam::Text(format!("%{}%", escape_like(search))));
    }

    if let Some(start) = filter.start {
        conditions.push("timestamp >= ?");
        params.push(SqlParam::Timestamp(start));
    }

    if let Some(end) = filter.end {
        conditions.push("timestamp <= ?");
        params.push(SqlParam::Timestamp(end));
    }

    Predicate {
        clause: conditions.join(" AND "),
        params,
    }
}

/// Full select statement: predicate, newest-first order and row cap
pub fn build_select(filter: &LogFilter, page_size: usize) -> (String, Vec<SqlParam>) {
    let predicate = build_predicate(filter);

    let mut sql =
        String::from("SELECT id, service, level, message, metadata, timestamp FROM logs");
    if !predicate.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate.clause);
    }
    sql.push_str(" ORDER BY timestamp DESC, id DESC LIMIT ?");

    let mut params = predicate.params;
    params.push(SqlParam::Integer(filter.effective_limit(page_size) as i64));

    (sql, params)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Which end of a range a date parameter bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Parse a `startDate`/`endDate` value.
///
/// Accepts an RFC 3339 instant, a naive `YYYY-MM-DDTHH:MM[:SS[.fff]]`
/// (read as UTC) or a bare date, which covers the whole day.
pub fn parse_bound(
    param: &'static str,
    value: &str,
    bound: Bound,
) -> Result<DateTime<Utc>, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        param,
        value: value.to_string(),
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())?;
    let naive = match bound {
        Bound::Start => date.and_hms_opt(0, 0, 0),
        Bound::End => date.and_hms_milli_opt(23, 59, 59, 999),
    }
    .ok_or_else(invalid)?;

    Ok(naive.and_utc())
}
