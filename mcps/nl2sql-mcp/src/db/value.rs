//! Scalar values and row sets returned by the database

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

/// A single decoded cell
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Dates and timestamps, the values the example policy keeps alone
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlValue::Date(_) | SqlValue::Timestamp(_) | SqlValue::TimestampTz(_)
        )
    }

    /// Empty strings and empty blobs
    pub fn is_empty(&self) -> bool {
        match self {
            SqlValue::Text(s) => s.is_empty(),
            SqlValue::Bytes(b) => b.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(i) => write!(f, "{}", i),
            SqlValue::UInt(u) => write!(f, "{}", u),
            // Whole floats keep a fractional digit so they never read as integers
            SqlValue::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Decimal(d) => write!(f, "{}", d.normalize()),
            SqlValue::Text(s) => f.write_str(s),
            SqlValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SqlValue::Time(t) => write!(f, "{}", t),
            SqlValue::Timestamp(ts) => write!(f, "{}", ts),
            SqlValue::TimestampTz(ts) => write!(f, "{}", ts),
            SqlValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            SqlValue::Json(v) => write!(f, "{}", v),
        }
    }
}

/// An ordered row set with its column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Keep at most `max_rows` rows and shorten text cells longer than
    /// `max_str_len` characters
    pub fn truncated(mut self, max_rows: Option<usize>, max_str_len: usize) -> Self {
        if let Some(max_rows) = max_rows {
            self.rows.truncate(max_rows);
        }
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if let SqlValue::Text(text) = cell {
                    *text = truncate_word(text, max_str_len, "...");
                }
            }
        }
        self
    }
}

/// Cut `content` to `length` characters at a word boundary, ending with
/// `suffix`. Strings already short enough are returned unchanged.
pub fn truncate_word(content: &str, length: usize, suffix: &str) -> String {
    if length == 0 || content.chars().count() <= length {
        return content.to_string();
    }

    let keep = length.saturating_sub(suffix.chars().count());
    let head: String = content.chars().take(keep).collect();
    let head = match head.rsplit_once(' ') {
        Some((before, _)) => before.to_string(),
        None => head,
    };
    format!("{}{}", head, suffix)
}
