//! Database access
//!
//! A [`Database`] wraps one live connection for the duration of a request.
//! It exposes the introspection primitives the schema loader needs and a
//! transaction-scoped [`Database::fetch`] whose failures come back as an
//! [`ExecutionError`] rather than an `Err` the caller must bail on.

mod dialect;
mod mysql;
mod postgres;
pub mod sql;
mod sqlite;
mod value;

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use thiserror::Error;

use crate::config::DbConfig;
use crate::error::{ConfigError, Error, Result};

pub use dialect::Dialect;
pub use value::{truncate_word, QueryRows, SqlValue};

/// Rows shown by the "read table" resource
pub const READ_TABLE_LIMIT: usize = 100;

/// A column as reported by the engine's catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub autoincrement: bool,
    pub comment: Option<String>,
}

/// One (constrained column, referred column) pair of a foreign key
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyInfo {
    pub column: String,
    /// `None` when the referred table lives in the schema being loaded
    pub referred_schema: Option<String>,
    pub referred_table: String,
    pub referred_column: String,
}

/// A failed statement, carrying the driver's message verbatim
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Something that can run a SQL statement and hand back rows
#[async_trait]
pub trait SqlExecutor: Send {
    async fn fetch(&mut self, sql: &str) -> std::result::Result<QueryRows, ExecutionError>;
}

/// Catalog and sampling calls made while building an M-Schema
#[async_trait]
pub trait SchemaSource: Send {
    fn dialect(&self) -> Dialect;

    fn schema(&self) -> Option<&str>;

    fn use_schema(&mut self, schema: String);

    async fn list_tables(&mut self) -> Result<Vec<String>>;

    async fn has_table(&mut self, table: &str) -> Result<bool>;

    async fn table_comment(&mut self, table: &str) -> Result<Option<String>>;

    async fn primary_keys(&mut self, table: &str) -> Result<Vec<String>>;

    async fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyInfo>>;

    async fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>>;

    async fn distinct_values(
        &mut self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> std::result::Result<Vec<SqlValue>, ExecutionError>;
}

enum Backend {
    Sqlite(SqliteConnection),
    MySql(MySqlConnection),
    Postgres(PgConnection),
}

/// One live connection plus the schema it introspects
pub struct Database {
    conn: Backend,
    dialect: Dialect,
    /// Schema as configured, `None` for the connection default
    schema: Option<String>,
    /// Schema used in catalog queries (resolved default for mysql/postgres)
    search_schema: String,
    timeout: Duration,
}

impl Database {
    /// Open a connection, bounded by the configured timeout
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let timeout = config.timeout();
        tracing::debug!("Connecting to {}", config.redacted_url());

        let mut db = tokio::time::timeout(timeout, Self::open(config))
            .await
            .map_err(|_| Error::Connect(format!("timed out after {}s", timeout.as_secs())))??;

        db.search_schema = match (&db.schema, &mut db.conn) {
            (Some(schema), _) => schema.clone(),
            (None, Backend::Sqlite(_)) => "main".to_string(),
            (None, Backend::MySql(conn)) => mysql::current_schema(conn).await?,
            (None, Backend::Postgres(conn)) => postgres::current_schema(conn).await?,
        };

        Ok(db)
    }

    async fn open(config: &DbConfig) -> Result<Self> {
        let connect_err = |e: sqlx::Error| Error::Connect(e.to_string());

        let conn = match config.dialect {
            Dialect::Sqlite => {
                let path = config.path.as_ref().ok_or(ConfigError::Missing("DB_PATH"))?;
                let conn = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(false)
                    .connect()
                    .await
                    .map_err(connect_err)?;
                Backend::Sqlite(conn)
            }
            Dialect::MySql => {
                let url = config.dialect.connection_url(config)?;
                let conn = MySqlConnectOptions::from_str(&url)
                    .map_err(connect_err)?
                    .connect()
                    .await
                    .map_err(connect_err)?;
                Backend::MySql(conn)
            }
            Dialect::Postgres => {
                let url = config.dialect.connection_url(config)?;
                let conn = PgConnectOptions::from_str(&url)
                    .map_err(connect_err)?
                    .connect()
                    .await
                    .map_err(connect_err)?;
                Backend::Postgres(conn)
            }
        };

        Ok(Self {
            conn,
            dialect: config.dialect,
            schema: config.schema.clone(),
            search_schema: String::new(),
            timeout: config.timeout(),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The configured schema, if any
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Point introspection and sampling at another schema
    pub fn use_schema(&mut self, schema: impl Into<String>) {
        let schema = schema.into();
        self.search_schema = schema.clone();
        self.schema = Some(schema);
    }

    /// Base tables in the active schema, sorted by name
    pub async fn list_tables(&mut self) -> Result<Vec<String>> {
        let schema = self.search_schema.as_str();
        let tables = match &mut self.conn {
            Backend::Sqlite(conn) => sqlite::list_tables(conn).await?,
            Backend::MySql(conn) => mysql::list_tables(conn, schema).await?,
            Backend::Postgres(conn) => postgres::list_tables(conn, schema).await?,
        };
        Ok(tables)
    }

    pub async fn has_table(&mut self, table: &str) -> Result<bool> {
        let schema = self.search_schema.as_str();
        let exists = match &mut self.conn {
            Backend::Sqlite(conn) => sqlite::has_table(conn, table).await?,
            Backend::MySql(conn) => mysql::has_table(conn, schema, table).await?,
            Backend::Postgres(conn) => postgres::has_table(conn, schema, table).await?,
        };
        Ok(exists)
    }

    /// Table comment; always `None` for dialects without comment support
    pub async fn table_comment(&mut self, table: &str) -> Result<Option<String>> {
        let schema = self.search_schema.as_str();
        let comment = match &mut self.conn {
            Backend::Sqlite(_) => None,
            Backend::MySql(conn) => mysql::table_comment(conn, schema, table).await?,
            Backend::Postgres(conn) => postgres::table_comment(conn, schema, table).await?,
        };
        Ok(comment)
    }

    pub async fn primary_keys(&mut self, table: &str) -> Result<Vec<String>> {
        let schema = self.search_schema.as_str();
        let result = match &mut self.conn {
            Backend::Sqlite(conn) => sqlite::primary_keys(conn, table).await,
            Backend::MySql(conn) => mysql::primary_keys(conn, schema, table).await,
            Backend::Postgres(conn) => postgres::primary_keys(conn, schema, table).await,
        };
        result.map_err(|source| introspection(table, source))
    }

    pub async fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let schema = self.search_schema.as_str();
        let result = match &mut self.conn {
            Backend::Sqlite(conn) => sqlite::foreign_keys(conn, table).await,
            Backend::MySql(conn) => mysql::foreign_keys(conn, schema, table).await,
            Backend::Postgres(conn) => postgres::foreign_keys(conn, schema, table).await,
        };
        result.map_err(|source| introspection(table, source))
    }

    pub async fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        let schema = self.search_schema.as_str();
        let result = match &mut self.conn {
            Backend::Sqlite(conn) => sqlite::columns(conn, table).await,
            Backend::MySql(conn) => mysql::columns(conn, schema, table).await,
            Backend::Postgres(conn) => postgres::columns(conn, schema, table).await,
        };
        result.map_err(|source| introspection(table, source))
    }

    /// Up to `limit` distinct non-null, non-empty values of a column
    pub async fn distinct_values(
        &mut self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> std::result::Result<Vec<SqlValue>, ExecutionError> {
        let sql = format!(
            "SELECT DISTINCT {} FROM {} LIMIT {}",
            self.dialect.quote_identifier(column),
            self.dialect.qualified_table(self.schema.as_deref(), table),
            limit
        );
        let rows = self.fetch(&sql).await?;
        Ok(rows
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter(|v| !v.is_null() && !v.is_empty())
            .collect())
    }

    /// Execute one statement in its own transaction
    pub async fn fetch(&mut self, sql: &str) -> std::result::Result<QueryRows, ExecutionError> {
        let sql = sql::preprocess_sql_query(sql);
        if sql::is_empty_statement(&sql) {
            return Err(ExecutionError::new("empty SQL statement"));
        }

        let timeout = self.timeout;
        let running = async {
            match &mut self.conn {
                Backend::Sqlite(conn) => sqlite::fetch(conn, &sql).await,
                Backend::MySql(conn) => mysql::fetch(conn, &sql).await,
                Backend::Postgres(conn) => postgres::fetch(conn, &sql).await,
            }
        };
        bounded(timeout, running).await
    }

    /// First `limit` rows of a table
    pub async fn read_table(&mut self, table: &str, limit: usize) -> Result<QueryRows> {
        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            self.dialect.qualified_table(self.schema.as_deref(), table),
            limit
        );
        self.fetch(&sql)
            .await
            .map_err(|e| Error::Query(e.message))
    }

    pub async fn close(self) {
        let closed = match self.conn {
            Backend::Sqlite(conn) => conn.close().await,
            Backend::MySql(conn) => conn.close().await,
            Backend::Postgres(conn) => conn.close().await,
        };
        if let Err(e) = closed {
            tracing::debug!("Error closing connection: {}", e);
        }
    }
}

#[async_trait]
impl SqlExecutor for Database {
    async fn fetch(&mut self, sql: &str) -> std::result::Result<QueryRows, ExecutionError> {
        Database::fetch(self, sql).await
    }
}

#[async_trait]
impl SchemaSource for Database {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn use_schema(&mut self, schema: String) {
        Database::use_schema(self, schema)
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        Database::list_tables(self).await
    }

    async fn has_table(&mut self, table: &str) -> Result<bool> {
        Database::has_table(self, table).await
    }

    async fn table_comment(&mut self, table: &str) -> Result<Option<String>> {
        Database::table_comment(self, table).await
    }

    async fn primary_keys(&mut self, table: &str) -> Result<Vec<String>> {
        Database::primary_keys(self, table).await
    }

    async fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        Database::foreign_keys(self, table).await
    }

    async fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        Database::columns(self, table).await
    }

    async fn distinct_values(
        &mut self,
        table: &str,
        column: &str,
        limit: usize,
    ) -> std::result::Result<Vec<SqlValue>, ExecutionError> {
        Database::distinct_values(self, table, column, limit).await
    }
}

/// Run a statement future, turning an overrun into an [`ExecutionError`]
pub(crate) async fn bounded<F>(
    timeout: Duration,
    running: F,
) -> std::result::Result<QueryRows, ExecutionError>
where
    F: Future<Output = std::result::Result<QueryRows, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, running).await {
        Ok(result) => result.map_err(ExecutionError::from),
        Err(_) => Err(ExecutionError::new(format!(
            "statement timed out after {:?}",
            timeout
        ))),
    }
}

fn introspection(table: &str, source: sqlx::Error) -> Error {
    Error::Introspection {
        table: table.to_string(),
        source,
    }
}
