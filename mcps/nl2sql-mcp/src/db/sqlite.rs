//! SQLite introspection and row decoding

use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Executor, Row, Statement, TypeInfo, ValueRef};

use super::value::{QueryRows, SqlValue};
use super::{ColumnInfo, ForeignKeyInfo};

pub(super) async fn list_tables(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )
    .fetch_all(conn)
    .await
}

pub(super) async fn has_table(conn: &mut SqliteConnection, table: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
    )
    .bind(table)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

pub(super) async fn primary_keys(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk")
        .bind(table)
        .fetch_all(conn)
        .await
}

pub(super) async fn foreign_keys(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<ForeignKeyInfo>, sqlx::Error> {
    let rows: Vec<(i64, String, String, Option<String>)> = sqlx::query_as(
        "SELECT seq, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?) ORDER BY id, seq",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    let mut keys = Vec::with_capacity(rows.len());
    for (seq, referred_table, column, referred_column) in rows {
        // A missing target column means the key points at the referred primary key
        let referred_column = match referred_column {
            Some(column) => column,
            None => primary_keys(&mut *conn, &referred_table)
                .await?
                .into_iter()
                .nth(seq as usize)
                .unwrap_or_default(),
        };
        keys.push(ForeignKeyInfo {
            column,
            referred_schema: None,
            referred_table,
            referred_column,
        });
    }
    Ok(keys)
}

pub(super) async fn columns(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<ColumnInfo>, sqlx::Error> {
    let rows: Vec<(String, String, i64, Option<String>, i64)> = sqlx::query_as(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid",
    )
    .bind(table)
    .fetch_all(conn)
    .await?;

    let pk_count = rows.iter().filter(|(.., pk)| *pk > 0).count();

    Ok(rows
        .into_iter()
        .map(|(name, data_type, notnull, default, pk)| {
            // A lone INTEGER primary key aliases the rowid
            let autoincrement =
                pk > 0 && pk_count == 1 && data_type.eq_ignore_ascii_case("INTEGER");
            ColumnInfo {
                name,
                data_type,
                nullable: notnull == 0,
                default,
                autoincrement,
                comment: None,
            }
        })
        .collect())
}

/// Run one statement inside a transaction, committing on success
pub(super) async fn fetch(conn: &mut SqliteConnection, sql: &str) -> Result<QueryRows, sqlx::Error> {
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

fn decode_row(row: &SqliteRow) -> Vec<SqlValue> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

fn decode_value(row: &SqliteRow, idx: usize) -> SqlValue {
    // SQLite is dynamically typed: the storage class comes from the value,
    // the declared column type only tells us whether text holds a date
    let storage = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return SqlValue::Null,
    };
    let declared = row.column(idx).type_info().name().to_ascii_uppercase();

    let decoded = match storage.as_str() {
        "INTEGER" => row.try_get::<i64, _>(idx).map(SqlValue::Int),
        "REAL" => row.try_get::<f64, _>(idx).map(SqlValue::Float),
        "BLOB" => row.try_get::<Vec<u8>, _>(idx).map(SqlValue::Bytes),
        _ => match declared.as_str() {
            "DATETIME" => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .map(SqlValue::Timestamp)
                .or_else(|_| row.try_get::<String, _>(idx).map(SqlValue::Text)),
            "DATE" => row
                .try_get::<chrono::NaiveDate, _>(idx)
                .map(SqlValue::Date)
                .or_else(|_| row.try_get::<String, _>(idx).map(SqlValue::Text)),
            _ => row.try_get::<String, _>(idx).map(SqlValue::Text),
        },
    };

    decoded.unwrap_or_else(|e| {
        tracing::debug!("Could not decode column {} ({}): {}", idx, storage, e);
        SqlValue::Text(format!("<{}>", storage))
    })
}
