//! Turning sampled column values into prompt examples
//!
//! Values are scanned in order. A date or timestamp keeps only itself;
//! anything that looks like an email address or a URL drops the whole
//! sample, so personal data and links never reach the prompt. Binary
//! columns have no textual form and are never sampled.

use regex::Regex;
use std::sync::LazyLock;

use crate::db::SqlValue;

/// Distinct values sampled per column
pub const SAMPLE_SIZE: usize = 5;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").expect("Invalid email regex"));

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

fn is_url(value: &str) -> bool {
    value.contains("http://") || value.contains("https://")
}

/// Apply the example policy to a column sample
pub fn examples_to_str(values: Vec<SqlValue>) -> Vec<String> {
    let mut kept: Vec<SqlValue> = Vec::with_capacity(values.len());

    for value in values {
        if matches!(value, SqlValue::Bytes(_)) {
            return Vec::new();
        }
        if value.is_temporal() {
            kept = vec![value];
            break;
        }
        if let SqlValue::Decimal(d) = &value {
            kept.push(SqlValue::Text(d.normalize().to_string()));
            continue;
        }

        let text = value.to_string();
        if is_email(&text) || is_url(&text) {
            return Vec::new();
        }
        kept.push(value);
    }

    kept.into_iter()
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
