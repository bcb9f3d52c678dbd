//! Rendering query results as text

use crate::db::{ExecutionError, QueryRows};

/// Markdown table: header, separator, one line per row
pub fn to_markdown(result: &QueryRows) -> String {
    let mut lines = Vec::with_capacity(result.rows.len() + 2);
    lines.push(format!("| {} |", result.columns.join(" | ")));
    lines.push(format!(
        "| {} |",
        vec!["---"; result.columns.len()].join(" | ")
    ));
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}

/// Header line of column names, then comma-joined rows
pub fn to_csv(result: &QueryRows) -> String {
    let mut lines = Vec::with_capacity(result.rows.len() + 1);
    lines.push(result.columns.join(","));
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

/// A table for rows, the message verbatim for a failed execution
pub fn render(result: &Result<QueryRows, ExecutionError>) -> String {
    match result {
        Ok(rows) => to_markdown(rows),
        Err(e) => e.message.clone(),
    }
}
