//! MySQL introspection and row decoding
//!
//! Catalog columns are cast to CHAR because MySQL 8 reports several
//! `information_schema` columns as binary strings.

use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Executor, Row, Statement, TypeInfo, ValueRef};

use super::value::{QueryRows, SqlValue};
use super::{ColumnInfo, ForeignKeyInfo};

pub(super) async fn current_schema(conn: &mut MySqlConnection) -> Result<String, sqlx::Error> {
    let schema: Option<String> = sqlx::query_scalar("SELECT CAST(DATABASE() AS CHAR)")
        .fetch_one(conn)
        .await?;
    Ok(schema.unwrap_or_default())
}

pub(super) async fn list_tables(
    conn: &mut MySqlConnection,
    schema: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
         WHERE table_schema = ? AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )
    .bind(schema)
    .fetch_all(conn)
    .await
}

pub(super) async fn has_table(
    conn: &mut MySqlConnection,
    schema: &str,
    table: &str,
) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = ? AND table_name = ?",
    )
    .bind(schema)
    .bind(table)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

pub(super) async fn table_comment(
    conn: &mut MySqlConnection,
    schema: &str,
    table: &str,
) -> Result<Option<String>, sqlx::Error> {
    let comment: Option<Option<String>> = sqlx::query_scalar(
        "SELECT CAST(table_comment AS CHAR) FROM information_schema.tables \
         WHERE table_schema = ? AND table_name = ?",
    )
    .bind(schema)
    .bind(table)
    .fetch_optional(conn)
    .await?;
    Ok(comment.flatten())
}

pub(super) async fn primary_keys(
    conn: &mut MySqlConnection,
    schema: &str,
    table: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT CAST(column_name AS CHAR) FROM information_schema.key_column_usage \
         WHERE table_schema = ? AND table_name = ? AND constraint_name = 'PRIMARY' \
         ORDER BY ordinal_position",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(conn)
    .await
}

pub(super) async fn foreign_keys(
    conn: &mut MySqlConnection,
    schema: &str,
    table: &str,
) -> Result<Vec<ForeignKeyInfo>, sqlx::Error> {
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT CAST(column_name AS CHAR), CAST(referenced_table_schema AS CHAR), \
                CAST(referenced_table_name AS CHAR), CAST(referenced_column_name AS CHAR) \
         FROM information_schema.key_column_usage \
         WHERE table_schema = ? AND table_name = ? AND referenced_table_name IS NOT NULL \
         ORDER BY constraint_name, ordinal_position",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(column, referred_schema, referred_table, referred_column)| ForeignKeyInfo {
            column,
            referred_schema: (referred_schema != schema).then_some(referred_schema),
            referred_table,
            referred_column,
        })
        .collect())
}

pub(super) async fn columns(
    conn: &mut MySqlConnection,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>, sqlx::Error> {
    let rows: Vec<(String, String, String, Option<String>, String, Option<String>)> =
        sqlx::query_as(
            "SELECT CAST(column_name AS CHAR), CAST(column_type AS CHAR), \
                    CAST(is_nullable AS CHAR), CAST(column_default AS CHAR), \
                    CAST(extra AS CHAR), CAST(column_comment AS CHAR) \
             FROM information_schema.columns \
             WHERE table_schema = ? AND table_name = ? \
             ORDER BY ordinal_position",
        )
        .bind(schema)
        .bind(table)
        .fetch_all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(name, data_type, is_nullable, default, extra, comment)| ColumnInfo {
            name,
            data_type,
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
            default,
            autoincrement: extra.to_ascii_lowercase().contains("auto_increment"),
            comment,
        })
        .collect())
}

/// Run one statement inside a transaction, committing on success
pub(super) async fn fetch(conn: &mut MySqlConnection, sql: &str) -> Result<QueryRows, sqlx::Error> {
    let mut tx = conn.begin().await?;

    let result: Result<QueryRows, sqlx::Error> = async {
        let stmt = (&mut *tx).prepare(sql).await?;
        let columns = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let rows = stmt.query().fetch_all(&mut *tx).await?;
        Ok(QueryRows::new(columns, rows.iter().map(decode_row).collect()))
    }
    .await;

    match result {
        Ok(rows) => {
            tx.commit().await?;
            Ok(rows)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!("Rollback failed: {}", rollback);
            }
            Err(e)
        }
    }
}

fn decode_row(row: &MySqlRow) -> Vec<SqlValue> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

fn decode_value(row: &MySqlRow, idx: usize) -> SqlValue {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Ok(_) => {}
        Err(_) => return SqlValue::Null,
    }
    let type_name = row.column(idx).type_info().name().to_string();

    let decoded = match type_name.as_str() {
        "BOOLEAN" => row.try_get::<bool, _>(idx).map(SqlValue::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(idx).map(SqlValue::Int)
        }
        name if name.ends_with("UNSIGNED") => row.try_get::<u64, _>(idx).map(SqlValue::UInt),
        "FLOAT" => row.try_get::<f32, _>(idx).map(|v| SqlValue::Float(v.into())),
        "DOUBLE" => row.try_get::<f64, _>(idx).map(SqlValue::Float),
        "DECIMAL" => row.try_get::<rust_decimal::Decimal, _>(idx).map(SqlValue::Decimal),
        "DATE" => row.try_get::<chrono::NaiveDate, _>(idx).map(SqlValue::Date),
        "TIME" => row.try_get::<chrono::NaiveTime, _>(idx).map(SqlValue::Time),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(SqlValue::Timestamp),
        "JSON" => row.try_get::<serde_json::Value, _>(idx).map(SqlValue::Json),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => row.try_get::<Vec<u8>, _>(idx).map(SqlValue::Bytes),
        _ => row.try_get::<String, _>(idx).map(SqlValue::Text),
    };

    decoded.unwrap_or_else(|e| {
        tracing::debug!("Falling back to text for column {} ({}): {}", idx, type_name, e);
        row.try_get::<String, _>(idx)
            .map(SqlValue::Text)
            .unwrap_or_else(|_| SqlValue::Text(format!("<{}>", type_name)))
    })
}
