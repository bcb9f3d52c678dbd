//! PostgreSQL introspection and row decoding

use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Executor, Row, Statement, TypeInfo, ValueRef};

use super::value::{QueryRows, SqlValue};
use super::{ColumnInfo, ForeignKeyInfo};

pub(super) async fn current_schema(conn: &mut PgConnection) -> Result<String, sqlx::Error> {
    let schema: Option<String> = sqlx::query_scalar("SELECT current_schema()::text")
        .fetch_one(conn)
        .await?;
    Ok(schema.unwrap_or_else(|| "public".to_string()))
}

pub(super) async fn list_tables(
    conn: &mut PgConnection,
    schema: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )
    .bind(schema)
    .fetch_all(conn)
    .await
}

pub(super) async fn has_table(
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS ( \
             SELECT 1 FROM pg_catalog.pg_class c \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname = $1 AND c.relname = $2 \
               AND c.relkind IN ('r', 'p', 'v', 'm', 'f'))",
    )
    .bind(schema)
    .bind(table)
    .fetch_one(conn)
    .await
}

pub(super) async fn table_comment(
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
) -> Result<Option<String>, sqlx::Error> {
    let comment: Option<Option<String>> = sqlx::query_scalar(
        "SELECT obj_description(c.oid, 'pg_class') \
         FROM pg_catalog.pg_class c \
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = $1 AND c.relname = $2",
    )
    .bind(schema)
    .bind(table)
    .fetch_optional(conn)
    .await?;
    Ok(comment.flatten())
}

pub(super) async fn primary_keys(
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT a.attname::text \
         FROM pg_catalog.pg_index i \
         JOIN pg_catalog.pg_class c ON c.oid = i.indrelid \
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) \
         JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum \
         WHERE i.indisprimary AND n.nspname = $1 AND c.relname = $2 \
         ORDER BY k.ord",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(conn)
    .await
}

pub(super) async fn foreign_keys(
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
) -> Result<Vec<ForeignKeyInfo>, sqlx::Error> {
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT a.attname::text, rn.nspname::text, rc.relname::text, ra.attname::text \
         FROM pg_catalog.pg_constraint con \
         JOIN pg_catalog.pg_class c ON c.oid = con.conrelid \
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         JOIN pg_catalog.pg_class rc ON rc.oid = con.confrelid \
         JOIN pg_catalog.pg_namespace rn ON rn.oid = rc.relnamespace \
         CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refnum, ord) \
         JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum \
         JOIN pg_catalog.pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.refnum \
         WHERE con.contype = 'f' AND n.nspname = $1 AND c.relname = $2 \
         ORDER BY con.conname, k.ord",
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
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>, sqlx::Error> {
    let rows: Vec<(String, String, bool, Option<String>, Option<String>, bool)> = sqlx::query_as(
        "SELECT a.attname::text, \
                format_type(a.atttypid, a.atttypmod), \
                NOT a.attnotnull, \
                pg_get_expr(d.adbin, d.adrelid), \
                col_description(a.attrelid, a.attnum), \
                a.attidentity <> '' \
         FROM pg_catalog.pg_attribute a \
         JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
         LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
         WHERE n.nspname = $1 AND c.relname = $2 AND a.attnum > 0 AND NOT a.attisdropped \
         ORDER BY a.attnum",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, data_type, nullable, default, comment, identity)| {
            let serial = default
                .as_deref()
                .is_some_and(|d| d.starts_with("nextval("));
            ColumnInfo {
                name,
                data_type,
                nullable,
                default,
                autoincrement: identity || serial,
                comment,
            }
        })
        .collect())
}

/// Run one statement inside a transaction, committing on success
pub(super) async fn fetch(conn: &mut PgConnection, sql: &str) -> Result<QueryRows, sqlx::Error> {
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

fn decode_row(row: &PgRow) -> Vec<SqlValue> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

fn decode_value(row: &PgRow, idx: usize) -> SqlValue {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Ok(_) => {}
        Err(_) => return SqlValue::Null,
    }
    let type_name = row.column(idx).type_info().name().to_string();

    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(idx).map(SqlValue::Bool),
        "INT2" => row.try_get::<i16, _>(idx).map(|v| SqlValue::Int(v.into())),
        "INT4" => row.try_get::<i32, _>(idx).map(|v| SqlValue::Int(v.into())),
        "INT8" => row.try_get::<i64, _>(idx).map(SqlValue::Int),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(|v| SqlValue::Float(v.into())),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(SqlValue::Float),
        "NUMERIC" => row.try_get::<rust_decimal::Decimal, _>(idx).map(SqlValue::Decimal),
        "DATE" => row.try_get::<chrono::NaiveDate, _>(idx).map(SqlValue::Date),
        "TIME" => row.try_get::<chrono::NaiveTime, _>(idx).map(SqlValue::Time),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(SqlValue::Timestamp),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .map(SqlValue::TimestampTz),
        "JSON" | "JSONB" => row.try_get::<serde_json::Value, _>(idx).map(SqlValue::Json),
        "BYTEA" => row.try_get::<Vec<u8>, _>(idx).map(SqlValue::Bytes),
        _ => row.try_get::<String, _>(idx).map(SqlValue::Text),
    };

    decoded.unwrap_or_else(|e| {
        tracing::debug!("Could not decode column {} ({}): {}", idx, type_name, e);
        SqlValue::Text(format!("<{}>", type_name))
    })
}
