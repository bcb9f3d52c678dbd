//! SQL text clean-up applied before every execution

use regex::Regex;
use std::sync::LazyLock;

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--[^\n]*").expect("Invalid line comment regex"));

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("Invalid block comment regex"));

/// Remove `-- ...` and `/* ... */` comments and trim the result
pub fn remove_sql_comments(sql: &str) -> String {
    let without_line = LINE_COMMENT.replace_all(sql, "");
    let without_block = BLOCK_COMMENT.replace_all(&without_line, "");
    without_block.trim().to_string()
}

/// Strip comments and terminate the statement with exactly one `;`
pub fn preprocess_sql_query(sql: &str) -> String {
    let cleaned = remove_sql_comments(sql);
    let body = cleaned.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!("{};", body)
}

/// True when nothing but the terminator is left
pub fn is_empty_statement(sql: &str) -> bool {
    sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_semicolon() {
        assert_eq!(preprocess_sql_query("SELECT 1"), "SELECT 1;");
        assert_eq!(preprocess_sql_query("SELECT 1;"), "SELECT 1;");
    }

    #[test]
    fn test_collapses_repeated_terminators() {
        assert_eq!(preprocess_sql_query("SELECT 1; ;\n;"), "SELECT 1;");
    }

    #[test]
    fn test_strips_line_comments() {
        let sql = "-- count users\nSELECT COUNT(*) FROM users -- all of them\n";
        let out = preprocess_sql_query(sql);
        assert_eq!(out, "SELECT COUNT(*) FROM users;");
        assert!(!out.contains("--"));
    }

    #[test]
    fn test_strips_block_comments() {
        let sql = "SELECT /* the id */ id\nFROM t /* multi\nline */";
        let out = preprocess_sql_query(sql);
        assert!(!out.contains("/*"));
        assert!(!out.contains("*/"));
        assert!(out.ends_with(';'));
        assert_eq!(out.matches(';').count(), 1);
    }

    #[test]
    fn test_comment_before_terminator() {
        assert_eq!(preprocess_sql_query("SELECT 1 -- done;"), "SELECT 1;");
    }

    #[test]
    fn test_empty_statement() {
        let out = preprocess_sql_query("");
        assert_eq!(out, ";");
        assert!(is_empty_statement(&out));
        assert!(is_empty_statement(&preprocess_sql_query("-- nothing here")));
        assert!(!is_empty_statement("SELECT 1;"));
    }
}
